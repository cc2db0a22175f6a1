pub type Result<T> = std::result::Result<T, crate::error::Error>;

#[macro_export]
macro_rules! verify_arg {
    ($name:expr, $expr:expr) => {{
        let result = $expr;
        $crate::result::verify_arg(result, stringify!($name), stringify!($expr))?;
    }};
}

/// Checks that `count` bytes starting at `offset` fit within a region of `len` bytes,
/// returning an `Overflow` error from the enclosing function otherwise.
#[macro_export]
macro_rules! verify_range {
    ($offset:expr, $count:expr, $len:expr) => {{
        $crate::result::verify_range($offset, $count, $len)?;
    }};
}

#[inline]
pub fn verify_arg(predicate: bool, name: &str, condition: &str) -> Result<()> {
    if predicate {
        Ok(())
    } else {
        invalid_arg(name, condition)
    }
}

#[inline]
pub fn verify_range(offset: usize, count: usize, len: usize) -> Result<()> {
    match offset.checked_add(count) {
        Some(end) if end <= len => Ok(()),
        _ => overflow(offset, count, len),
    }
}

#[cold]
pub fn invalid_arg(name: &str, condition: &str) -> Result<()> {
    Err(crate::error::ErrorKind::InvalidArgument {
        name: name.to_string(),
        message: condition.to_string(),
    }
    .into())
}

#[cold]
pub fn overflow(offset: usize, count: usize, len: usize) -> Result<()> {
    Err(crate::error::Error::overflow(offset, count, len))
}
