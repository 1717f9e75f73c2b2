use crate::value::Value;
use xxhash_rust::xxh3::Xxh3;

/// Value-hash format version byte mixed into every key digest.
const VALUE_HASH_VERSION: u8 = 1;

/// Stable XXH3 seed used by group-key hashing.
const VALUE_HASH_SEED: u64 = 0;

///
/// StableHash
///
/// StableHash is the fixed-width hash identifier used to bucket group keys.
///

pub(crate) type StableHash = u64;

fn feed_u8(h: &mut Xxh3, x: u8) {
    h.update(&[x]);
}
fn feed_u32(h: &mut Xxh3, x: u32) {
    h.update(&x.to_be_bytes());
}
fn feed_u64(h: &mut Xxh3, x: u64) {
    h.update(&x.to_be_bytes());
}
fn feed_i64(h: &mut Xxh3, x: i64) {
    h.update(&x.to_be_bytes());
}
fn feed_bytes(h: &mut Xxh3, b: &[u8]) {
    h.update(b);
}

#[cfg(test)]
thread_local! {
    static TEST_HASH_OVERRIDE: std::cell::Cell<Option<StableHash>> =
        const { std::cell::Cell::new(None) };
}

// Execute one closure with a thread-local test hash override and always restore
// the previous override state, even if the closure panics.
#[cfg(test)]
pub(crate) fn with_test_hash_override<T>(
    override_hash: StableHash,
    f: impl FnOnce() -> T + std::panic::UnwindSafe,
) -> T {
    let previous = TEST_HASH_OVERRIDE.with(|cell| cell.replace(Some(override_hash)));
    let result = std::panic::catch_unwind(f);
    TEST_HASH_OVERRIDE.with(|cell| cell.set(previous));
    match result {
        Ok(value) => value,
        Err(payload) => std::panic::resume_unwind(payload),
    }
}

/// Hash an ordered list of grouping values.
///
/// Numerics that compare equal across Int/Uint/Float64 hash identically, so
/// hash bucketing never splits one group.
#[must_use]
pub(crate) fn stable_hash_values<'a>(values: impl IntoIterator<Item = &'a Value>) -> StableHash {
    #[cfg(test)]
    if let Some(hash) = TEST_HASH_OVERRIDE.with(std::cell::Cell::get) {
        return hash;
    }

    let mut h = Xxh3::with_seed(VALUE_HASH_SEED);
    feed_u8(&mut h, VALUE_HASH_VERSION);
    let mut count = 0u32;
    for value in values {
        write_to_hasher(value, &mut h);
        count = count.saturating_add(1);
    }
    feed_u32(&mut h, count);

    h.digest()
}

// Integral floats inside [i64::MIN, 2^64) hash as the integer they equal.
const INT_HASH_FLOOR: f64 = -9_223_372_036_854_775_808.0;
const INT_HASH_CEIL: f64 = 18_446_744_073_709_551_616.0;

#[expect(clippy::cast_possible_truncation)]
fn write_to_hasher(value: &Value, h: &mut Xxh3) {
    feed_u8(h, value.tag().to_u8());

    match value {
        Value::Blob(bytes) => {
            feed_u32(h, bytes.len() as u32);
            feed_bytes(h, bytes);
        }
        Value::Bool(b) => feed_u8(h, u8::from(*b)),
        Value::Int(v) => write_integer(h, i128::from(*v)),
        Value::Uint(v) => write_integer(h, i128::from(*v)),
        Value::Float64(f) => {
            let v = f.get();
            if v.fract() == 0.0 && (INT_HASH_FLOOR..INT_HASH_CEIL).contains(&v) {
                write_integer(h, v as i128);
            } else {
                feed_u8(h, 0xF0);
                feed_bytes(h, &f.to_be_bytes());
            }
        }
        Value::Null => {}
        Value::Text(text) => {
            feed_u32(h, text.len() as u32);
            feed_bytes(h, text.as_bytes());
        }
    }
}

#[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn write_integer(h: &mut Xxh3, v: i128) {
    if v < 0 {
        feed_u8(h, 0xF1);
        feed_i64(h, v as i64);
    } else {
        feed_u8(h, 0xF2);
        feed_u64(h, v as u64);
    }
}
