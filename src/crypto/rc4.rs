//! RC4 stream cipher.
//!
//! PDF standard security derives keys of 5 to 16 bytes at runtime, so the
//! keystream is implemented here rather than behind a compile-time key
//! size. The cipher is explicitly stateful: one instance runs across every
//! string and the stream payload of a single indirect object, in document
//! byte order.

/// RC4 keystream state.
pub struct Rc4 {
    s: [u8; 256],
    i: u8,
    j: u8,
}

impl Rc4 {
    /// Key-schedule a new cipher. The key must be 1 to 256 bytes.
    pub fn new(key: &[u8]) -> Self {
        debug_assert!(!key.is_empty() && key.len() <= 256);

        let mut s = [0u8; 256];
        for (i, v) in s.iter_mut().enumerate() {
            *v = i as u8;
        }
        let mut j: u8 = 0;
        for i in 0..256 {
            j = j
                .wrapping_add(s[i])
                .wrapping_add(key[i % key.len()]);
            s.swap(i, usize::from(j));
        }
        Self { s, i: 0, j: 0 }
    }

    /// XOR the keystream into `data` in place. Successive calls continue
    /// the keystream; encryption and decryption are the same operation.
    pub fn apply(&mut self, data: &mut [u8]) {
        for b in data {
            self.i = self.i.wrapping_add(1);
            self.j = self.j.wrapping_add(self.s[usize::from(self.i)]);
            self.s.swap(usize::from(self.i), usize::from(self.j));
            let k = self.s[usize::from(
                self.s[usize::from(self.i)].wrapping_add(self.s[usize::from(self.j)]),
            )];
            *b ^= k;
        }
    }

    /// One-shot convenience for callers that do not need a running stream.
    pub fn process(key: &[u8], data: &mut [u8]) {
        Rc4::new(key).apply(data);
    }
}
