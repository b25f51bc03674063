use maligned::{A4096, align_first};

pub mod dev;
pub mod sim;

/// create page-aligned buffer, required for O_DIRECT reads
pub fn create_buf(len: usize) -> Vec<u8> {
    let mut buf = align_first::<_, A4096>(len);
    buf.resize(len, 0);
    assert_eq!(buf.len(), len);
    buf
}

#[test]
fn test_create_buf_alignment() {
    for &len in &[1, 512, 4096, 16 << 20] {
        let buf = create_buf(len);
        assert_eq!(buf.len(), len);
        assert_eq!(buf.as_ptr() as usize % 4096, 0);
    }
}
