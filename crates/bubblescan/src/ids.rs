/// Random bytes per circle id.
const ID_BYTES: usize = 10;

/// Opaque circle id: 10 random bytes, hex encoded.
pub fn random_id() -> String {
    let bytes: [u8; ID_BYTES] = rand::random();
    hex::encode(bytes)
}
