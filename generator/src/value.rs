use rand::Rng;

const INT_VALUES: &[i64] = &[
    0,
    -1,
    1,
    0xff,
    -0xff,
    9284128,
    128412288,
    -9284120,
    i32::MAX as i64,
    i32::MIN as i64,
    u32::MAX as i64,
    i64::MAX,
    // i64::MIN has no literal form: `-9223372036854775808` parses as a float.
    i64::MIN + 1,
];

const FLOAT_VALUES: &[f64] = &[
    0.0,
    -0.0,
    -1.0,
    2.51,
    329.5,
    0.00043,
    21948.293242,
    -2222.9999,
    2842.6378,
    1e15,
    5e-324,
    f64::MAX,
    f64::NAN,
    f64::INFINITY,
    f64::NEG_INFINITY,
];

const STRING_VALUES: &[&[u8]] = &[
    b"",
    b",",
    b" ",
    b"``",
    b"''",
    b"\"",
    b"\\",
    b"0x1f",
    b"000",
    b"24",
    b"-123",
    b"1e3",
    b"\x00",
    b"\t",
    b"\xff",
    b"simple string",
    "ハロー・ワールド".as_bytes(),
    b"1\n2",
    b"<div/>",
    b"<h1>ok</h1>",
    b"<p>",
    b"</p>",
    br#"{"key":1}"#,
    br#"["val"]"#,
];

/// Uniform pick from a non-empty pool.
pub fn pick<T: Copy, R: Rng>(rng: &mut R, pool: &[T]) -> T {
    pool[rng.random_range(0..pool.len())]
}

/// Biased-random scalar values. With probability `p_interesting` a value
/// is taken from the edge-case pool, otherwise it is synthesized.
#[derive(Copy, Clone, Debug)]
pub struct ValueGenerator {
    p_interesting: f64,
}

impl ValueGenerator {
    pub fn new(p_interesting: f64) -> Self {
        Self { p_interesting }
    }

    fn interesting<R: Rng>(&self, rng: &mut R) -> bool {
        rng.random_bool(self.p_interesting)
    }

    pub fn bool_value<R: Rng>(&self, rng: &mut R) -> bool {
        rng.random_bool(0.5)
    }

    pub fn int_value<R: Rng>(&self, rng: &mut R) -> i64 {
        if self.interesting(rng) {
            return pick(rng, INT_VALUES);
        }
        match rng.random_range(0..5) {
            0 | 1 => rng.random_range(0..0xffff),
            2 | 3 => -rng.random_range(0..0xffff_i64),
            _ => rng.random_range(100000..=19438420511),
        }
    }

    pub fn float_value<R: Rng>(&self, rng: &mut R) -> f64 {
        if self.interesting(rng) {
            return pick(rng, FLOAT_VALUES);
        }
        let unit: f64 = rng.random();
        match rng.random_range(0..4) {
            0 => unit,
            1 | 2 => unit * rng.random_range(0..1000_u32) as f64,
            _ => unit * rng.random_range(0..10000000_u32) as f64,
        }
    }

    pub fn string_value<R: Rng>(&self, rng: &mut R) -> Vec<u8> {
        if self.interesting(rng) {
            return pick(rng, STRING_VALUES).to_vec();
        }
        let mut s = Vec::new();
        for _ in 0..rng.random_range(1..=6) {
            let ch: u8 = rng.random_range(0..0x7f);
            if (ch.is_ascii_graphic() && ch != b'$') || ch == b' ' {
                s.push(ch);
            } else {
                s.extend_from_slice(pick(rng, STRING_VALUES));
            }
        }
        s
    }
}

/// Samples `f` until `n` distinct values are collected. First-seen order is
/// kept so the result only depends on the rng state.
///
/// `f` must be able to produce at least `n` distinct values.
pub fn generate_unique_values<T, F>(n: usize, mut f: F) -> Vec<T>
where
    T: PartialEq,
    F: FnMut() -> T,
{
    let mut values = Vec::with_capacity(n);
    while values.len() < n {
        let x = f();
        if !values.contains(&x) {
            values.push(x);
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_pools_have_edge_cases() {
        assert!(FLOAT_VALUES.iter().any(|v| v.is_nan()));
        assert!(FLOAT_VALUES.iter().any(|v| *v == 0.0 && v.is_sign_negative()));
        assert!(INT_VALUES.contains(&i64::MAX));
        assert!(!INT_VALUES.contains(&i64::MIN));
        assert!(STRING_VALUES.contains(&&b"\x00"[..]));
        assert!(STRING_VALUES.iter().any(|s| std::str::from_utf8(s).is_err()));
    }

    #[test]
    fn test_always_interesting_draws_from_pool() {
        let values = ValueGenerator::new(1.0);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            assert!(INT_VALUES.contains(&values.int_value(&mut rng)));
            let f = values.float_value(&mut rng);
            assert!(FLOAT_VALUES.iter().any(|v| v.to_bits() == f.to_bits()));
            let s = values.string_value(&mut rng);
            assert!(STRING_VALUES.contains(&s.as_slice()));
        }
    }

    #[test]
    fn test_synthesized_strings_have_no_dollar() {
        let values = ValueGenerator::new(0.0);
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..200 {
            let s = values.string_value(&mut rng);
            assert!(!s.contains(&b'$'));
        }
    }

    #[test]
    fn test_unique_values_keep_first_seen_order() {
        let mut seq = [3, 1, 3, 2, 1, 4].into_iter();
        let values = generate_unique_values(3, || seq.next().unwrap());
        assert_eq!(values, vec![3, 1, 2]);
    }

    #[test]
    fn test_unique_values_deterministic() {
        let values = ValueGenerator::new(0.5);
        let mut r1 = StdRng::seed_from_u64(99);
        let mut r2 = StdRng::seed_from_u64(99);
        let a = generate_unique_values(5, || values.int_value(&mut r1));
        let b = generate_unique_values(5, || values.int_value(&mut r2));
        assert_eq!(a, b);
    }
}
