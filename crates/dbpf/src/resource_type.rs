//! Names of well known resource types.

use std::borrow::Cow;

/// String table
pub const STRING_TABLE: u32 = 0x220557DA;
/// XML tuning
pub const TUNING: u32 = 0x0333406C;
/// Binary tuning data
pub const SIM_DATA: u32 = 0x025ED6F4;
/// Create-a-Sim part
pub const CAS_PART: u32 = 0x034AEECB;
/// DDS image
pub const DDS: u32 = 0x00B2D882;
/// PNG image
pub const PNG: u32 = 0x3C1AF1F2;
/// Thumbnail image
pub const THUMBNAIL: u32 = 0x3C2A8647;

const KNOWN: &[(u32, &str)] = &[
    (CAS_PART, "CASPart"),
    (0x0355E0A6, "BodyBlendData"),
    (TUNING, "Tuning"),
    (SIM_DATA, "SimData"),
    (0x545AC67A, "CombinedTuning"),
    (STRING_TABLE, "StringTable"),
    (DDS, "DDS"),
    (PNG, "PNG"),
    (0x2F7D0004, "DST"),
    (0x015A1849, "Geometry"),
    (0x00AE6C67, "Bone"),
    (0x8EAF13DE, "RIG"),
    (0xC0DB5AE7, "CatalogObject"),
    (0x319E4F1D, "ObjectDefinition"),
    (0x02D5DF13, "CLIP"),
    (0x01EEF63A, "AuditoryData"),
    (THUMBNAIL, "Thumbnail"),
    (0x5B282D45, "ThumbnailAlt"),
];

/// Human readable name for a resource type, `Unknown_XXXXXXXX` when the type is not known
pub fn type_name(type_id: u32) -> Cow<'static, str> {
    KNOWN
        .iter()
        .find(|(id, _)| *id == type_id)
        .map(|(_, name)| Cow::Borrowed(*name))
        .unwrap_or_else(|| Cow::Owned(format!("Unknown_{type_id:08X}")))
}

/// Looks a type up by its name, ignoring case
pub fn type_id(name: &str) -> Option<u32> {
    KNOWN
        .iter()
        .find(|(_, known)| known.eq_ignore_ascii_case(name))
        .map(|(id, _)| *id)
}
