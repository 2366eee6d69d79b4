/// Key layout for Fjall partitions
///
/// Partition structure:
/// - `downloads`: download:{download_id} -> DownloadRecord (protobuf)

/// Encode a download key: download:{download_id}
pub fn encode_download_key(download_id: &str) -> Vec<u8> {
    format!("download:{}", download_id).into_bytes()
}

/// Decode a download key: download:{download_id} -> download_id
pub fn decode_download_key(key: &[u8]) -> Option<String> {
    let key_str = std::str::from_utf8(key).ok()?;
    key_str.strip_prefix("download:").map(String::from)
}
