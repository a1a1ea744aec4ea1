#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = try_decode(data);
});

fn try_decode(data: &[u8]) -> Result<(), gif_anim::DecodeError> {
    let sequence = gif_anim::decode(data, 1.0, 0.0)?;
    // whatever decodes must encode again
    if let Ok(bytes) = gif_anim::encode(&sequence, 0.0, 0) {
        gif_anim::decode(&bytes, 1.0, 0.0)?;
    }
    Ok(())
}
