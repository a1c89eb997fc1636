//! Type-id to type-name lookup for result column headers.
//!
//! Covers the built-in types a result grid commonly shows. Anything else
//! (extension types, enums, domains) reports [`UNKNOWN_TYPE`].

pub const UNKNOWN_TYPE: &str = "unknown";

pub const BOOL: u32 = 16;
pub const INT8: u32 = 20;
pub const INT2: u32 = 21;
pub const INT4: u32 = 23;
pub const TEXT: u32 = 25;
pub const OID: u32 = 26;
pub const JSON: u32 = 114;
pub const FLOAT4: u32 = 700;
pub const FLOAT8: u32 = 701;
pub const NUMERIC: u32 = 1700;
pub const JSONB: u32 = 3802;

const TYPE_NAMES: &[(u32, &str)] = &[
    (16, "bool"),
    (17, "bytea"),
    (18, "char"),
    (19, "name"),
    (20, "int8"),
    (21, "int2"),
    (23, "int4"),
    (24, "regproc"),
    (25, "text"),
    (26, "oid"),
    (114, "json"),
    (142, "xml"),
    (650, "cidr"),
    (700, "float4"),
    (701, "float8"),
    (774, "macaddr8"),
    (790, "money"),
    (829, "macaddr"),
    (869, "inet"),
    (1000, "_bool"),
    (1005, "_int2"),
    (1007, "_int4"),
    (1009, "_text"),
    (1015, "_varchar"),
    (1016, "_int8"),
    (1021, "_float4"),
    (1022, "_float8"),
    (1042, "bpchar"),
    (1043, "varchar"),
    (1082, "date"),
    (1083, "time"),
    (1114, "timestamp"),
    (1184, "timestamptz"),
    (1186, "interval"),
    (1231, "_numeric"),
    (1266, "timetz"),
    (1560, "bit"),
    (1562, "varbit"),
    (1700, "numeric"),
    (2950, "uuid"),
    (2951, "_uuid"),
    (3802, "jsonb"),
    (3807, "_jsonb"),
];

pub fn type_name(oid: u32) -> &'static str {
    TYPE_NAMES
        .binary_search_by_key(&oid, |(id, _)| *id)
        .map_or(UNKNOWN_TYPE, |idx| TYPE_NAMES[idx].1)
}

/// Text-decodes as a JSON number.
pub fn is_numeric(oid: u32) -> bool {
    matches!(oid, INT8 | INT2 | INT4 | OID | FLOAT4 | FLOAT8 | NUMERIC)
}

pub fn is_bool(oid: u32) -> bool {
    oid == BOOL
}

pub fn is_json(oid: u32) -> bool {
    matches!(oid, JSON | JSONB)
}
