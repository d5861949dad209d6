//! Color derivation from raw RGBC samples
//!
//! Everything here is pure: no bus access, no delays. The formulas are
//! coarse approximations intended for ambient sensing, not colorimetry.

use crate::{IntegrationTime, NormalizedColor, RawColor};

/// Reason a sample cannot produce a color temperature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum InvalidSample {
    /// No light on the channels the estimator divides by
    Dark,
    /// Clear channel at or above the saturation level for the integration time
    Saturated,
    /// Red channel is zero once the inferred IR content is removed
    NoRedSignal,
}

/// Scale red, green and blue relative to the clear channel onto 0-255.
///
/// Returns all zeros when the clear channel is zero. Values are not clamped:
/// the photodiodes have different spectral responses, so a color channel can
/// exceed clear and map above 255.
pub fn normalize(raw: &RawColor) -> NormalizedColor {
    if raw.clear == 0 {
        return NormalizedColor {
            red: 0.0,
            green: 0.0,
            blue: 0.0,
        };
    }

    let clear = raw.clear as f32;
    NormalizedColor {
        red: raw.red as f32 / clear * 255.0,
        green: raw.green as f32 / clear * 255.0,
        blue: raw.blue as f32 / clear * 255.0,
    }
}

/// Map RGB counts to CIE XYZ tristimulus values.
///
/// Coefficients fit 6500K fluorescent, 3000K fluorescent and 60W
/// incandescent sources. Y approximates illuminance.
fn to_xyz(raw: &RawColor) -> (f32, f32, f32) {
    let r = raw.red as f32;
    let g = raw.green as f32;
    let b = raw.blue as f32;

    let x = -0.14282 * r + 1.54924 * g - 0.95641 * b;
    let y = -0.32466 * r + 1.57837 * g - 0.73191 * b;
    let z = -0.68202 * r + 0.77073 * g + 0.56332 * b;
    (x, y, z)
}

/// Correlated color temperature in Kelvin using McCamy's approximation.
///
/// The chromaticity denominator `0.1858 - yc` is not guarded, so samples
/// close to that line produce extreme values. Out-of-range results saturate
/// into `0..=65535` (NaN becomes 0).
pub fn color_temperature_mccamy(raw: &RawColor) -> Result<u16, InvalidSample> {
    if raw.red == 0 && raw.green == 0 && raw.blue == 0 {
        return Err(InvalidSample::Dark);
    }

    let (x, y, z) = to_xyz(raw);

    // Chromaticity coordinates
    let sum = x + y + z;
    let xc = x / sum;
    let yc = y / sum;

    let n = (xc - 0.3320) / (0.1858 - yc);
    let cct = 449.0 * libm::powf(n, 3.0) + 3525.0 * libm::powf(n, 2.0) + 6823.3 * n + 5520.33;

    Ok(cct as u16)
}

/// Correlated color temperature in Kelvin from the blue/red ratio after IR
/// removal (AMS DN40 method).
///
/// The sensor has no IR channel; IR is inferred from how far R+G+B exceeds
/// clear. Samples at or near saturation are rejected since the clear channel
/// no longer bounds R+G+B there.
///
/// IR removal saturates at zero. When the inferred IR is at or above the
/// blue count the blue term vanishes and the result is the bare 1391K
/// offset; callers should treat that value as low confidence.
pub fn color_temperature_dn40(
    raw: &RawColor,
    integration_time: IntegrationTime,
) -> Result<u16, InvalidSample> {
    if raw.clear == 0 {
        return Err(InvalidSample::Dark);
    }

    // 1024 counts accumulate per 2.4ms cycle. Past 64 cycles the 16-bit
    // counter clips before the photodiode does.
    let cycles = integration_time.cycles();
    let digital = cycles > 63;
    let mut sat: u32 = if digital { 65535 } else { 1024 * cycles };

    // Ripple from mains lighting lets C read below the max while still
    // saturating, so shorter integrations use a 75% level.
    if !digital {
        sat -= sat / 4;
    }

    if u32::from(raw.clear) >= sat {
        return Err(InvalidSample::Saturated);
    }

    let rgb = u32::from(raw.red) + u32::from(raw.green) + u32::from(raw.blue);
    let clear = u32::from(raw.clear);
    let ir = if rgb > clear { (rgb - clear) / 2 } else { 0 };

    let r2 = u32::from(raw.red).saturating_sub(ir);
    let b2 = u32::from(raw.blue).saturating_sub(ir);
    if r2 == 0 {
        return Err(InvalidSample::NoRedSignal);
    }

    let cct = 3810 * b2 / r2 + 1391;
    Ok(u16::try_from(cct).unwrap_or(u16::MAX))
}

/// Rough illuminance estimate from the Y term of the XYZ mapping.
///
/// Does not use the clear channel and is not calibrated against gain or
/// integration time. Negative results become 0.
pub fn lux_estimate(raw: &RawColor) -> u16 {
    let (_, y, _) = to_xyz(raw);
    y as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(red: u16, green: u16, blue: u16, clear: u16) -> RawColor {
        RawColor {
            clear,
            red,
            green,
            blue,
        }
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_normalize_zero_clear() {
        let n = normalize(&raw(100, 200, 300, 0));
        assert_eq!(n.red, 0.0);
        assert_eq!(n.green, 0.0);
        assert_eq!(n.blue, 0.0);
    }

    #[test]
    fn test_normalize_scales_against_clear() {
        let n = normalize(&raw(50, 60, 70, 180));
        assert!(approx(n.red, 50.0 / 180.0 * 255.0));
        assert!(approx(n.green, 85.0));
        assert!(approx(n.blue, 70.0 / 180.0 * 255.0));
        assert!((n.red - 70.83).abs() < 0.01);
        assert!((n.blue - 99.17).abs() < 0.01);
    }

    #[test]
    fn test_normalize_does_not_clamp() {
        let n = normalize(&raw(400, 100, 0, 200));
        assert!(approx(n.red, 510.0));
        assert!(approx(n.green, 127.5));
        assert_eq!(n.blue, 0.0);
    }

    #[test]
    fn test_mccamy_dark() {
        assert_eq!(
            color_temperature_mccamy(&raw(0, 0, 0, 1234)),
            Err(InvalidSample::Dark)
        );
    }

    #[test]
    fn test_mccamy_matches_formula() {
        let sample = raw(1000, 1200, 800, 3000);
        let (r, g, b) = (1000.0f32, 1200.0f32, 800.0f32);
        let x = -0.14282 * r + 1.54924 * g - 0.95641 * b;
        let y = -0.32466 * r + 1.57837 * g - 0.73191 * b;
        let z = -0.68202 * r + 0.77073 * g + 0.56332 * b;
        let xc = x / (x + y + z);
        let yc = y / (x + y + z);
        let n = (xc - 0.3320) / (0.1858 - yc);
        let expected = 449.0 * n * n * n + 3525.0 * n * n + 6823.3 * n + 5520.33;

        let cct = color_temperature_mccamy(&sample).unwrap();
        assert!((i32::from(cct) - expected as i32).abs() <= 1);
    }

    #[test]
    fn test_mccamy_nonzero_for_any_channel() {
        assert!(color_temperature_mccamy(&raw(0, 0, 1, 0)).is_ok());
        assert!(color_temperature_mccamy(&raw(0, 1, 0, 0)).is_ok());
        assert!(color_temperature_mccamy(&raw(1, 0, 0, 0)).is_ok());
    }

    #[test]
    fn test_dn40_digital_regime() {
        let cct = color_temperature_dn40(&raw(300, 300, 300, 1000), IntegrationTime::Ms154);
        assert_eq!(cct, Ok(5201));
    }

    #[test]
    fn test_dn40_analog_saturation() {
        // 1 cycle: sat = 1024, reduced to 768 for ripple
        let cct = color_temperature_dn40(&raw(100, 100, 100, 800), IntegrationTime::Ms2_4);
        assert_eq!(cct, Err(InvalidSample::Saturated));

        let cct = color_temperature_dn40(&raw(100, 100, 100, 768), IntegrationTime::Ms2_4);
        assert_eq!(cct, Err(InvalidSample::Saturated));

        let cct = color_temperature_dn40(&raw(100, 100, 100, 767), IntegrationTime::Ms2_4);
        assert!(cct.is_ok());
    }

    #[test]
    fn test_dn40_digital_saturation() {
        let cct = color_temperature_dn40(&raw(100, 100, 100, 65535), IntegrationTime::Ms700);
        assert_eq!(cct, Err(InvalidSample::Saturated));
    }

    #[test]
    fn test_dn40_dark() {
        let cct = color_temperature_dn40(&raw(100, 100, 100, 0), IntegrationTime::Ms154);
        assert_eq!(cct, Err(InvalidSample::Dark));
    }

    #[test]
    fn test_dn40_removes_ir() {
        // R+G+B = 1200 exceeds C = 1000 by 200, so IR = 100
        let cct = color_temperature_dn40(&raw(500, 400, 300, 1000), IntegrationTime::Ms101);
        assert_eq!(cct, Ok((3810 * 200 / 400 + 1391) as u16));
    }

    #[test]
    fn test_dn40_no_red_after_ir() {
        let cct = color_temperature_dn40(&raw(0, 300, 300, 500), IntegrationTime::Ms154);
        assert_eq!(cct, Err(InvalidSample::NoRedSignal));

        // IR = (100 + 900 + 100 - 500) / 2 = 300 swamps red entirely
        let cct = color_temperature_dn40(&raw(100, 900, 100, 500), IntegrationTime::Ms154);
        assert_eq!(cct, Err(InvalidSample::NoRedSignal));
    }

    #[test]
    fn test_dn40_ir_swamps_blue() {
        // IR = (400 + 400 + 100 - 500) / 2 = 200, above blue
        let cct = color_temperature_dn40(&raw(400, 400, 100, 500), IntegrationTime::Ms154);
        assert_eq!(cct, Ok(1391));
    }

    #[test]
    fn test_dn40_saturates_result() {
        let cct = color_temperature_dn40(&raw(1, 0, 60000, 65000), IntegrationTime::Ms700);
        assert_eq!(cct, Ok(u16::MAX));
    }

    #[test]
    fn test_lux_estimate() {
        assert_eq!(lux_estimate(&raw(0, 1000, 0, 0)), 1578);
        assert_eq!(lux_estimate(&raw(300, 300, 300, 1000)), 156);
    }

    #[test]
    fn test_lux_estimate_negative_is_zero() {
        assert_eq!(lux_estimate(&raw(1000, 0, 1000, 2000)), 0);
    }
}
