//! Helper macros for parsing packed structs.
//!
//! TIFF structures (and hence EXIF blocks) announce their
//! byte order in the first two bytes, so everything here
//! is generic over the [`Endian`] of the reader and is
//! usually driven by a runtime
//! [`Endianness`](byteordered::Endianness).

use std::{error::Error, io::Error as IOError};

use byteordered::{byteorder::ReadBytesExt, ByteOrdered, Endian};

/// Declare a [`Parseable`] struct.
///
/// Fields are read in declaration order. A failure is
/// reported with the struct and field name as context.
macro_rules! declare_parseable_struct {
    (
        $(#[$smeta:meta])*
        $svis:vis struct $sname:ident {
            $($fvis:vis $name:ident => $ty:ty),* $(,)?
        }
    ) => {
        $(#[$smeta])*
        $svis struct $sname {
            $($fvis $name: $ty),*
        }

        impl crate::parse::Parseable for $sname {
            type Error = anyhow::Error;
            fn parse<T, E>(
                r: &mut byteordered::ByteOrdered<T, E>,
            ) -> Result<Self, Self::Error>
            where
                T: byteordered::byteorder::ReadBytesExt,
                E: byteordered::Endian,
            {
                $(
                    let $name = anyhow::Context::with_context(
                        <$ty as crate::parse::Parseable>::parse(r),
                        || format!("parsing field `{}.{}`", stringify!($sname), stringify!($name)),
                    )?;
                )*
                Ok($sname { $($name),* })
            }
        }
    };
}

pub(crate) trait Parseable: Sized {
    type Error;
    fn parse<T: ReadBytesExt, E: Endian>(r: &mut ByteOrdered<T, E>) -> Result<Self, Self::Error>;
}

macro_rules! impl_parseable {
    ($ty:ty, $method:ident) => {
        impl Parseable for $ty {
            type Error = IOError;
            fn parse<T: ReadBytesExt, E: Endian>(
                r: &mut ByteOrdered<T, E>,
            ) -> Result<Self, IOError> {
                r.$method()
            }
        }
    };
}

impl_parseable!(u8, read_u8);
impl_parseable!(i8, read_i8);
impl_parseable!(u16, read_u16);
impl_parseable!(i16, read_i16);
impl_parseable!(u32, read_u32);
impl_parseable!(i32, read_i32);
impl_parseable!(f32, read_f32);
impl_parseable!(f64, read_f64);

impl<Ty, const N: usize> Parseable for [Ty; N]
where
    Ty: Parseable,
    <Ty as Parseable>::Error: Send + Sync + Error + 'static,
    [Ty; N]: Default,
{
    type Error = anyhow::Error;
    fn parse<T: ReadBytesExt, E: Endian>(r: &mut ByteOrdered<T, E>) -> Result<Self, Self::Error> {
        let mut out: [Ty; N] = Default::default();
        for slot in out.iter_mut() {
            *slot = Ty::parse(r)?;
        }
        Ok(out)
    }
}

/// Parse `count` consecutive values.
pub(crate) fn parse_many<Ty, T, E>(r: &mut ByteOrdered<T, E>, count: usize) -> anyhow::Result<Vec<Ty>>
where
    Ty: Parseable,
    anyhow::Error: From<<Ty as Parseable>::Error>,
    T: ReadBytesExt,
    E: Endian,
{
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(Ty::parse(r)?);
    }
    Ok(out)
}
