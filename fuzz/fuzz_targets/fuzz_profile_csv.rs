#![no_main]
use libfuzzer_sys::fuzz_target;
use presso_core::{ActuatorConstants, Profile, ProfilePoint, compile};

fuzz_target!(|data: &[u8]| {
    let Ok(rows) = presso_config::read_profile_csv(data) else {
        return;
    };
    let points: Vec<ProfilePoint> = rows.into_iter().map(ProfilePoint::from).collect();
    // unchecked input must compile without panicking, validated or not
    let k = ActuatorConstants::default();
    let _ = compile(&Profile::from_points_unchecked(points.clone()), &k);
    if let Ok(p) = Profile::from_points(points) {
        let seq = compile(&p, &k);
        assert!(seq.len() < p.len().max(1));
        let _ = seq.to_wire();
    }
});
