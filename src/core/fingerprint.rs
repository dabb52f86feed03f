//! 内容指纹计算（使用 BLAKE3 快速哈希）
//!
//! 指纹只取决于字节内容，与时间戳、权限等元数据无关。
//! 非加密强度是有意的取舍：对本语料规模，相同指纹即视为相同内容。

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// 读取块大小
const CHUNK_SIZE: usize = 64 * 1024;

/// 计算内存数据的指纹
///
/// 只取前 16 字节（32 个十六进制字符），足够检测变化
pub fn fingerprint_bytes(data: &[u8]) -> String {
    let hash = blake3::hash(data);
    hash.to_hex()[..32].to_string()
}

/// 流式计算文件内容指纹
///
/// 按块读取，不把整个文件载入内存，支持超大文件
pub fn fingerprint_file(path: &Path) -> io::Result<String> {
    let mut hasher = blake3::Hasher::new();
    let mut file = File::open(path)?;
    let mut buf = [0u8; CHUNK_SIZE];

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hasher.finalize().to_hex()[..32].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_fingerprint_deterministic() {
        let a = fingerprint_bytes(b"hello corpus");
        let b = fingerprint_bytes(b"hello corpus");
        let c = fingerprint_bytes(b"hello corpus!");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_file_fingerprint_matches_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.xml");
        fs::write(&path, b"<doc>content</doc>").unwrap();

        assert_eq!(
            fingerprint_file(&path).unwrap(),
            fingerprint_bytes(b"<doc>content</doc>")
        );
    }

    #[test]
    fn test_fingerprint_ignores_metadata() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.xml");
        fs::write(&path, b"same content").unwrap();
        let first = fingerprint_file(&path).unwrap();

        // 修改权限后重新计算，内容未变，指纹不变
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_readonly(true);
        fs::set_permissions(&path, perms.clone()).unwrap();
        let second = fingerprint_file(&path).unwrap();
        perms.set_readonly(false);
        fs::set_permissions(&path, perms).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_large_file_streams_in_chunks() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.bin");
        let data = vec![0xabu8; CHUNK_SIZE * 3 + 17];
        fs::write(&path, &data).unwrap();

        assert_eq!(fingerprint_file(&path).unwrap(), fingerprint_bytes(&data));
    }
}
