/// 获取当前 UTC 时间戳（毫秒）
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generate a 24-character hex object id.
///
/// Layout (12 bytes):
///   - 4 bytes: seconds since the Unix epoch (big endian)
///   - 8 bytes: random
pub fn object_id() -> String {
    use rand::Rng;
    let secs = (now_millis() / 1000) as u32;
    let rand_bits: u64 = rand::thread_rng().r#gen();
    format!("{:08x}{:016x}", secs, rand_bits)
}
