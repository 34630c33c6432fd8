//! Deterministic fingerprints for datasets recorded in artifact metadata.

/// 64-bit FNV-1a hash. Not cryptographic; only used to tell datasets apart in logs.
#[derive(Copy, Clone, Debug)]
pub struct Fingerprint(u64);

impl Fingerprint {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    pub fn new() -> Self {
        Self(Self::OFFSET_BASIS)
    }

    pub fn update(&mut self, bytes: &[u8]) {
        for b in bytes {
            self.0 = (self.0 ^ u64::from(*b)).wrapping_mul(Self::PRIME);
        }
    }

    /// Feed one CSV record; cells are separated so `["ab","c"]` and `["a","bc"]` differ.
    pub fn update_record<S: AsRef<str>>(&mut self, cells: &[S]) {
        for cell in cells {
            self.update(cell.as_ref().as_bytes());
            self.update(&[0x1f]);
        }
        self.update(b"\n");
    }

    pub fn finish(&self) -> u64 {
        self.0
    }

    /// 16-character lowercase hex form.
    pub fn finish_hex(&self) -> String {
        format!("{:016x}", self.0)
    }
}

impl Default for Fingerprint {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_reference_fnv1a_vectors() {
        let empty = Fingerprint::new();
        assert_eq!(empty.finish(), 0xcbf2_9ce4_8422_2325);

        let mut a = Fingerprint::new();
        a.update(b"a");
        assert_eq!(a.finish(), 0xaf63_dc4c_8601_ec8c);
    }

    #[test]
    fn cell_boundaries_matter() {
        let mut left = Fingerprint::new();
        left.update_record(&["ab", "c"]);
        let mut right = Fingerprint::new();
        right.update_record(&["a", "bc"]);
        assert_ne!(left.finish_hex(), right.finish_hex());
        assert_eq!(left.finish_hex().len(), 16);
    }
}
