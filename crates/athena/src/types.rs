//! Athena column types mapped to ETL metadata type names.

/// ETL type name for an Athena column type.
///
/// Parameterised types (`varchar(10)`, `decimal(10,2)`) are looked up by
/// their base name. Types with no mapping are returned unchanged.
pub fn athena_type_to_etl(athena_type: &str) -> String {
    let base = athena_type
        .split('(')
        .next()
        .unwrap_or(athena_type)
        .trim()
        .to_ascii_lowercase();

    let mapped = match base.as_str() {
        "char" | "varchar" | "string" => "character",
        "tinyint" | "smallint" | "integer" | "int" => "int",
        "bigint" => "long",
        "date" => "date",
        "timestamp" => "datetime",
        "boolean" => "boolean",
        "float" | "real" => "float",
        "double" => "double",
        _ => return athena_type.to_string(),
    };
    mapped.to_string()
}
