use super::serialize_u_int::SerializeUnsignedInt;
use serde::Serializer;

pub(crate) fn serialize<T, S>(register_address: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: std::fmt::LowerHex + SerializeUnsignedInt,
{
    // Addresses and register values read better as hex in YAML.
    if serializer.is_human_readable() {
        serializer.serialize_str(format!("{register_address:#x}").as_str())
    } else {
        register_address.serialize_int(serializer)
    }
}
