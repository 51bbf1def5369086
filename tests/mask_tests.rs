use rand::rngs::StdRng;
use rand::SeedableRng;
use tch::Kind;
use xgan::masks::{build_mask, MaskType};

fn mean(t: &tch::Tensor) -> f64 {
    t.mean(Kind::Float).double_value(&[])
}

fn sum(t: &tch::Tensor) -> f64 {
    t.sum(Kind::Float).double_value(&[])
}

#[test]
fn random_mask_keeps_about_eighty_percent() {
    let mut rng = StdRng::seed_from_u64(1);
    let trials = 10;
    let mut total = 0.;
    for _ in 0..trials {
        total += mean(&build_mask(MaskType::Random, 3, 64, 64, &mut rng));
    }
    let avg = total / trials as f64;
    assert!((avg - 0.8).abs() < 0.01, "mean mask value {avg}");
}

#[test]
fn random_mask_drops_whole_pixels() {
    let mut rng = StdRng::seed_from_u64(2);
    let mask = build_mask(MaskType::Random, 3, 16, 16, &mut rng);
    let first = mask.get(0);
    for channel in 1..3 {
        let diff = (mask.get(channel) - &first).abs();
        assert_eq!(f64::try_from(diff.max()).unwrap(), 0.0);
    }
}

#[test]
fn center_mask_zeroes_the_central_half() {
    let mut rng = StdRng::seed_from_u64(3);
    let mask = build_mask(MaskType::Center, 3, 64, 64, &mut rng);
    let hole = mask.narrow(1, 16, 32).narrow(2, 16, 32);
    assert_eq!(f64::try_from(hole.max()).unwrap(), 0.0);
    // Everything outside the hole stays one.
    assert_eq!(sum(&mask), (3 * (64 * 64 - 32 * 32)) as f64);
}

#[test]
fn left_mask_zeroes_the_left_half() {
    let mut rng = StdRng::seed_from_u64(4);
    let mask = build_mask(MaskType::Left, 1, 32, 32, &mut rng);
    assert_eq!(f64::try_from(mask.narrow(2, 0, 16).max()).unwrap(), 0.0);
    assert_eq!(f64::try_from(mask.narrow(2, 16, 16).min()).unwrap(), 1.0);
}

#[test]
fn full_mask_is_all_ones() {
    let mut rng = StdRng::seed_from_u64(5);
    let mask = build_mask(MaskType::Full, 3, 8, 8, &mut rng);
    assert_eq!(f64::try_from(mask.min()).unwrap(), 1.0);
}

#[test]
fn mask_type_parsing() {
    assert_eq!("random".parse::<MaskType>().unwrap(), MaskType::Random);
    assert_eq!("center".parse::<MaskType>().unwrap(), MaskType::Center);
    assert_eq!("left".parse::<MaskType>().unwrap(), MaskType::Left);
    assert_eq!("full".parse::<MaskType>().unwrap(), MaskType::Full);
    assert!("hexagon".parse::<MaskType>().is_err());
}
