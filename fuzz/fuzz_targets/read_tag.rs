#![no_main]
use libfuzzer_sys::fuzz_target;
use tagsave::{read_tag, DecodeContext, LevelState, MemoryStream, PlayerState};

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    // First byte picks the minor version to decode under
    let ctx = DecodeContext::new(data[0]);
    let body = data[1..].to_vec();
    let _: Result<PlayerState, _> = read_tag(&mut MemoryStream::from_bytes(body.clone()), ctx);
    let _: Result<LevelState, _> = read_tag(&mut MemoryStream::from_bytes(body), ctx);
});
