use criterion::Criterion;
use light_curve_microlensing::{
    LensParameters, MagnificationConfig, MagnificationCurve, MethodName, MethodSchedule,
    ScheduleToken, TimeGrid,
};
use std::hint::black_box;

pub fn bench_magnification(c: &mut Criterion) {
    let parameters = LensParameters::builder(2455746.0_f64, 0.05, 20.0)
        .rho(1e-3)
        .s(1.1)
        .q(0.01)
        .alpha_degrees(200.0)
        .build()
        .unwrap();

    for n_epochs in [100, 1000] {
        let times = TimeGrid::new()
            .n_epochs(n_epochs)
            .times(&parameters)
            .unwrap();
        for method in [
            MethodName::PointSource,
            MethodName::Quadrupole,
            MethodName::Hexadecapole,
            MethodName::FullContour,
        ] {
            let config = MagnificationConfig::default().with_default_method(method);
            c.bench_function(
                format!("Binary lens curve: {} epochs, {method}", times.len()).as_str(),
                |b| {
                    b.iter(|| {
                        MagnificationCurve::new(black_box(times.view()), &parameters)
                            .evaluate(&config)
                            .unwrap()
                    })
                },
            );
        }

        let schedule = MethodSchedule::new(&[
            ScheduleToken::time(2455744.0),
            ScheduleToken::method("hexadecapole"),
            ScheduleToken::time(2455745.5),
            ScheduleToken::method("full_contour"),
            ScheduleToken::time(2455746.5),
            ScheduleToken::method("hexadecapole"),
            ScheduleToken::time(2455748.0),
        ])
        .unwrap();
        let config = MagnificationConfig::default().with_schedule(schedule);
        c.bench_function(
            format!("Binary lens curve: {} epochs, scheduled", times.len()).as_str(),
            |b| {
                b.iter(|| {
                    MagnificationCurve::new(black_box(times.view()), &parameters)
                        .evaluate(&config)
                        .unwrap()
                })
            },
        );
    }
}
