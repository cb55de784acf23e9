#![allow(dead_code)]

use std::path::Path;

pub const EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1";

const LONG_LENGTH_VRS: [&[u8; 2]; 6] = [b"OB", b"OW", b"SQ", b"UN", b"UT", b"OF"];

/// Minimal Part 10 writer for synthetic slices.
pub struct SliceWriter {
    body: Vec<u8>,
}

impl SliceWriter {
    pub fn new() -> Self {
        Self { body: Vec::new() }
    }

    pub fn element(mut self, group: u16, element: u16, vr: &[u8; 2], value: &[u8]) -> Self {
        let mut value = value.to_vec();
        if value.len() % 2 == 1 {
            value.push(if vr == b"UI" || vr == b"OB" { 0 } else { b' ' });
        }
        self.body.extend_from_slice(&group.to_le_bytes());
        self.body.extend_from_slice(&element.to_le_bytes());
        self.body.extend_from_slice(vr);
        if LONG_LENGTH_VRS.contains(&vr) {
            self.body.extend_from_slice(&[0, 0]);
            self.body.extend_from_slice(&(value.len() as u32).to_le_bytes());
        } else {
            self.body.extend_from_slice(&(value.len() as u16).to_le_bytes());
        }
        self.body.extend_from_slice(&value);
        self
    }

    pub fn text(self, group: u16, element: u16, vr: &[u8; 2], value: &str) -> Self {
        self.element(group, element, vr, value.as_bytes())
    }

    pub fn us(self, group: u16, element: u16, value: u16) -> Self {
        self.element(group, element, b"US", &value.to_le_bytes())
    }

    /// A single-frame 16-bit CT slice.
    pub fn ct_slice(rows: u16, columns: u16, z: f64, pixels: &[u16]) -> Self {
        let bytes: Vec<u8> = pixels.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self::new()
            .text(0x0008, 0x0060, b"CS", "CT")
            .text(0x0018, 0x0015, b"CS", "HEAD")
            .text(0x0018, 0x0050, b"DS", "1.5")
            .text(0x0020, 0x0032, b"DS", &format!("0\\0\\{z}"))
            .text(0x0020, 0x0037, b"DS", "1\\0\\0\\0\\1\\0")
            .us(0x0028, 0x0002, 1)
            .us(0x0028, 0x0010, rows)
            .us(0x0028, 0x0011, columns)
            .text(0x0028, 0x0030, b"DS", "0.5\\0.5")
            .us(0x0028, 0x0100, 16)
            .us(0x0028, 0x0103, 0)
            .element(0x7FE0, 0x0010, b"OW", &bytes)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![0u8; 128];
        out.extend_from_slice(b"DICM");
        let uid = EXPLICIT_VR_LITTLE_ENDIAN.as_bytes();
        let mut padded = uid.to_vec();
        if padded.len() % 2 == 1 {
            padded.push(0);
        }
        out.extend_from_slice(&0x0002u16.to_le_bytes());
        out.extend_from_slice(&0x0010u16.to_le_bytes());
        out.extend_from_slice(b"UI");
        out.extend_from_slice(&(padded.len() as u16).to_le_bytes());
        out.extend_from_slice(&padded);
        out.extend_from_slice(&self.body);
        out
    }

    pub fn write(&self, path: impl AsRef<Path>) {
        std::fs::write(path, self.to_bytes()).unwrap();
    }
}

/// 512x512 background of 0 with a disc of 2000 in the middle.
pub fn disc_image() -> Vec<u16> {
    let (size, radius) = (512i32, 100i32);
    let center = size / 2;
    (0..size)
        .flat_map(|y| (0..size).map(move |x| (x, y)))
        .map(|(x, y)| {
            let (dx, dy) = (x - center, y - center);
            if dx * dx + dy * dy <= radius * radius {
                2000
            } else {
                0
            }
        })
        .collect()
}
