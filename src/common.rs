pub mod characteristics {
    use btleplug::api::bleuuid::uuid_from_u16;
    use uuid::Uuid;

    /// `F000xxxx-0451-4000-B000-000000000000`, the base of every TI sensor UUID.
    #[allow(clippy::unusual_byte_groupings)]
    const TI_BASE_UUID: u128 = 0xf0000000_0451_4000_b000_000000000000;

    const fn ti_uuid(short: u16) -> Uuid {
        Uuid::from_u128(TI_BASE_UUID | ((short as u128) << 96))
    }

    pub const TEMPERATURE_DATA: Uuid = ti_uuid(0xAA01);
    pub const TEMPERATURE_CONFIGURATION: Uuid = ti_uuid(0xAA02);
    pub const TEMPERATURE_PERIOD: Uuid = ti_uuid(0xAA03);

    pub const HUMIDITY_DATA: Uuid = ti_uuid(0xAA21);
    pub const HUMIDITY_CONFIGURATION: Uuid = ti_uuid(0xAA22);
    pub const HUMIDITY_PERIOD: Uuid = ti_uuid(0xAA23);

    pub const PRESSURE_DATA: Uuid = ti_uuid(0xAA41);
    pub const PRESSURE_CONFIGURATION: Uuid = ti_uuid(0xAA42);
    pub const PRESSURE_PERIOD: Uuid = ti_uuid(0xAA44);

    pub const LUMINANCE_DATA: Uuid = ti_uuid(0xAA71);
    pub const LUMINANCE_CONFIGURATION: Uuid = ti_uuid(0xAA72);
    pub const LUMINANCE_PERIOD: Uuid = ti_uuid(0xAA73);

    pub const MOVEMENT_DATA: Uuid = ti_uuid(0xAA81);
    pub const MOVEMENT_CONFIGURATION: Uuid = ti_uuid(0xAA82);
    pub const MOVEMENT_PERIOD: Uuid = ti_uuid(0xAA83);

    pub const BATTERY_LEVEL: Uuid = uuid_from_u16(0x2A19);

}
