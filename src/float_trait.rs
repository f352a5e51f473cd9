use conv::prelude::*;
use ndarray::{LinalgScalar, ScalarOperand};
use num_traits::{FloatConst, NumAssignOps};
use schemars::JsonSchema;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::{Debug, Display, LowerExp};
use std::iter::Sum;

/// Floating number trait, it is implemented for [f32] and [f64] only
pub trait Float:
    'static
    + Sized
    + num_traits::Float
    + FloatConst
    + NumAssignOps
    + Sum
    + Default
    + Debug
    + Display
    + LowerExp
    + Send
    + Sync
    + ScalarOperand
    + LinalgScalar
    + ValueFrom<usize>
    + ApproxFrom<usize>
    + ApproxFrom<f64>
    + ValueInto<f64>
    + Serialize
    + DeserializeOwned
    + JsonSchema
{
    fn half() -> Self;
    fn two() -> Self;
    fn three() -> Self;
    fn four() -> Self;
    fn five() -> Self;
}

macro_rules! float_trait_impl {
    ($t: ty) => {
        impl Float for $t {
            #[inline]
            fn half() -> Self {
                0.5
            }

            #[inline]
            fn two() -> Self {
                2.0
            }

            #[inline]
            fn three() -> Self {
                3.0
            }

            #[inline]
            fn four() -> Self {
                4.0
            }

            #[inline]
            fn five() -> Self {
                5.0
            }
        }
    };
}

float_trait_impl!(f32);
float_trait_impl!(f64);
