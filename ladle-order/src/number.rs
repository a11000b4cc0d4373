use uuid::Uuid;

/// Alphabet without 0/O and 1/I so numbers survive being read over the phone.
const ALPHABET: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZ";

/// Generate a customer-facing order number: MD- plus 8 chars from the
/// unambiguous alphabet. Uniqueness is enforced by the store; the ledger
/// retries with a fresh number on collision.
pub fn generate_order_number() -> String {
    let bytes = *Uuid::new_v4().as_bytes();
    let suffix: String = bytes
        .iter()
        .take(8)
        .map(|b| ALPHABET[(*b as usize) % ALPHABET.len()] as char)
        .collect();
    format!("MD-{}", suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_is_stable() {
        let number = generate_order_number();
        assert_eq!(number.len(), 11);
        assert!(number.starts_with("MD-"));
        assert!(number[3..]
            .bytes()
            .all(|b| ALPHABET.contains(&b)));
    }

    #[test]
    fn numbers_are_not_constant() {
        let a = generate_order_number();
        let b = generate_order_number();
        assert_ne!(a, b);
    }
}
