use uuid::Uuid;

/**
 * The well-known Serial Port Profile service class UUID. HC-05 style serial
 * modules (the one inside the prop included) expose their RFCOMM channel
 * under this service.
 */
pub const SPP_SERVICE: &str = "00001101-0000-1000-8000-00805f9b34fb";

/**
 * The RFCOMM channel the SPP service is bound to on HC-05 style modules.
 */
pub const SPP_CHANNEL: u8 = 1;

/**
 * Intensity of a channel driven at full power.
 */
pub const FULL_INTENSITY: u8 = 255;

pub fn make_spp_service_uuid() -> Uuid {
    Uuid::parse_str(SPP_SERVICE).unwrap()
}
