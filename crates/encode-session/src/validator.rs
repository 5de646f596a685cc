//! Configuration drift detection

use crate::{DriftPolicy, EncoderConfig, EncoderError, EncoderResult};

/// Whether `live` still matches what the session was created with
pub fn matches(live: &EncoderConfig, recorded: &EncoderConfig, policy: DriftPolicy) -> bool {
    check(live, recorded, policy).is_ok()
}

/// Like [`matches`], naming the first field that drifted
pub fn check(live: &EncoderConfig, recorded: &EncoderConfig, policy: DriftPolicy) -> EncoderResult<()> {
    compare("width", recorded.width, live.width)?;
    compare("height", recorded.height, live.height)?;
    compare("frame_rate", recorded.frame_rate, live.frame_rate)?;

    if policy == DriftPolicy::Strict {
        compare("pixel_format", recorded.pixel_format, live.pixel_format)?;
        compare("bit_rate", recorded.bit_rate, live.bit_rate)?;
        compare("max_frame_size", recorded.max_frame_size, live.max_frame_size)?;
    }

    Ok(())
}

fn compare<T>(field: &'static str, recorded: T, live: T) -> EncoderResult<()>
where
    T: PartialEq + std::fmt::Debug,
{
    if recorded == live {
        return Ok(());
    }

    Err(EncoderError::ConfigurationDrift {
        field,
        recorded: format!("{recorded:?}"),
        live: format!("{live:?}"),
    })
}
