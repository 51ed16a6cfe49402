use std::fmt;
use std::ops::{Deref, DerefMut};

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Wraps key material so it is scrubbed from memory the moment it goes out
/// of scope, whether dropped normally or during unwind.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Sensitive<T: Zeroize>(T);

impl<T: Zeroize> Sensitive<T> {
	pub fn new(value: T) -> Self {
		Self(value)
	}

	pub fn into_inner(mut self) -> T
	where
		T: Default,
	{
		std::mem::take(&mut self.0)
	}
}

impl<T: Zeroize> Deref for Sensitive<T> {
	type Target = T;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl<T: Zeroize> DerefMut for Sensitive<T> {
	fn deref_mut(&mut self) -> &mut Self::Target {
		&mut self.0
	}
}

/// Never prints the wrapped value, even in debug builds.
impl<T: Zeroize> fmt::Debug for Sensitive<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("Sensitive(..)")
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn debug_never_leaks_contents() {
		let secret = Sensitive::new([0xAAu8; 32]);
		assert_eq!(format!("{secret:?}"), "Sensitive(..)");
	}

	#[test]
	fn deref_reaches_inner() {
		let secret = Sensitive::new(vec![1u8, 2, 3]);
		assert_eq!(&*secret, &[1, 2, 3]);
	}
}
