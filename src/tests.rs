use crate::parameters::LensParameters;

/// Planetary event with the source crossing the central caustic region at `t_0 = 300`
pub fn planetary_event() -> LensParameters<f64> {
    LensParameters::builder(300.0, -0.07, 500.0)
        .rho(1e-4)
        .s(1.0)
        .q(0.01)
        .alpha_degrees(270.0)
        .build()
        .unwrap()
}

/// Assert that the expression is `Err(MulensError::InvalidInput)` for the named input
#[macro_export]
macro_rules! assert_invalid_input {
    ($result: expr_2021, $name: literal $(,)?) => {
        match $result {
            Err($crate::MulensError::InvalidInput { name, .. }) => assert_eq!(name, $name),
            other => panic!("InvalidInput {:?} expected, got {:?}", $name, other),
        }
    };
}
