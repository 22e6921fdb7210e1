use uuid::Uuid;

/// Generates a time-ordered, URL-safe identifier, optionally prefixed (`order_0190...`).
///
/// The token is a UUIDv7 in its 32-character lowercase hex form, so identifiers created later
/// compare greater than earlier ones.
pub fn generate_id(prefix: Option<&str>) -> String {
    let token = Uuid::now_v7().simple().to_string();
    match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}_{token}"),
        _ => token,
    }
}
