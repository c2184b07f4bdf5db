use super::*;
use crate::adapters::{RamFlash, RamFlashError};
use crate::domain::{ErrorKind, LayoutConfig, RegionStatus};

const TFM: RegionLayout = RegionLayout::resolve_or_panic(&LayoutConfig::tfm_default());
const AREA: AreaConfig = AreaConfig::contiguous(0, 1024);

fn region(mem: &mut [u8]) -> OtpNvRegion<RamFlash<'_>> {
    OtpNvRegion::new(RamFlash::nor(mem), TFM, AREA)
}

fn word(mem: &[u8], at: u32) -> u32 {
    let at = at as usize;
    u32::from_le_bytes([mem[at], mem[at + 1], mem[at + 2], mem[at + 3]])
}

#[test]
fn test_access_before_init() {
    let mut mem = [0xFFu8; 2048];
    let mut region = region(&mut mem);

    let mut buf = [0u8; 4];
    assert!(matches!(region.read(4, &mut buf), Err(OtpError::NotInitialized)));
    assert!(matches!(region.write(4, &buf), Err(OtpError::NotInitialized)));
    assert_eq!(region.status(), RegionStatus::Uninitialized);
}

#[test]
fn test_init_formats_blank_flash() {
    let mut mem = [0xFFu8; 2048];
    let mut region = region(&mut mem);

    region.init().unwrap();
    assert_eq!(region.status(), RegionStatus::Committed);
    assert_eq!(region.generation().unwrap(), 0);

    let flash = region.into_inner();
    let mem = flash.memory();
    let swap = TFM.swap_count_offset();
    assert_eq!(word(mem, 0), OTP_NV_COUNTERS_INITIALIZED);
    assert_eq!(word(mem, swap), 0);
    assert!(mem[4..swap as usize].iter().all(|&b| b == 0));
}

#[test]
fn test_init_is_idempotent() {
    let mut mem = [0xFFu8; 2048];
    let mut region = region(&mut mem);

    region.init().unwrap();
    let ops = region.flash().operations();
    region.init().unwrap();
    assert_eq!(region.flash().operations(), ops);
}

#[test]
fn test_invalid_input_touches_nothing() {
    let mut mem = [0xFFu8; 2048];
    let mut region = region(&mut mem);
    region.init().unwrap();
    let ops = region.flash().operations();

    let big = [0u8; 65];
    let cases = [
        region.write(4, &[]),
        region.write(4, &big),
        region.write(TFM.size() - 2, &[0, 0, 0, 0]),
        region.write(0, &[0, 0, 0, 0]),
        region.write(TFM.swap_count_offset() - 2, &[0, 0, 0, 0]),
    ];
    for result in cases {
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput, "{:?}", err);
    }
    assert_eq!(region.flash().operations(), ops);
    assert_eq!(region.generation().unwrap(), 0);
}

#[test]
fn test_control_words_are_reported() {
    let mut mem = [0xFFu8; 2048];
    let mut region = region(&mut mem);
    region.init().unwrap();

    assert!(matches!(
        region.write(2, &[1, 2, 3, 4]),
        Err(OtpError::ControlWord(FieldId::InitValue))
    ));
    assert!(matches!(
        region.write(TFM.swap_count_offset(), &[1]),
        Err(OtpError::ControlWord(FieldId::SwapCount))
    ));
}

#[test]
fn test_write_snapshots_previous_generation() {
    let mut mem = [0xFFu8; 2048];
    let mut region = region(&mut mem);
    region.init().unwrap();

    let huk = TFM.field(FieldId::Huk).unwrap();
    region.write(huk.offset, &[0xAA; 32]).unwrap();
    region.write(huk.offset, &[0xBB; 32]).unwrap();
    assert_eq!(region.generation().unwrap(), 2);

    let mem = region.into_inner();
    let mem = mem.memory();
    let staging = AREA.staging;
    // Staging holds generation 1, the state before the last write.
    assert_eq!(word(mem, staging + TFM.swap_count_offset()), 1);
    assert_eq!(mem[(staging + huk.offset) as usize], 0xAA);
    assert_eq!(mem[huk.offset as usize], 0xBB);
}

#[test]
fn test_failed_commit_falls_back_to_staging() {
    let mut mem = [0xFFu8; 2048];
    let mut region = region(&mut mem);
    region.init().unwrap();

    let lcs = TFM.field(FieldId::Lcs).unwrap();
    region.write(lcs.offset, &[1, 0, 0, 0]).unwrap();

    region
        .flash_mut()
        .fail_program_at(AREA.primary + TFM.swap_count_offset());
    let err = region.write(lcs.offset, &[2, 0, 0, 0]).unwrap_err();
    assert!(matches!(err, OtpError::Flash(RamFlashError::InjectedFault)));
    assert_eq!(region.status(), RegionStatus::RollbackPending);
    assert_eq!(region.active_copy(), Some(ActiveCopy::Staging));

    let mut buf = [0u8; 4];
    region.read(lcs.offset, &mut buf).unwrap();
    assert_eq!(buf, [1, 0, 0, 0]);
    assert_eq!(region.generation().unwrap(), 1);

    // The next write rebuilds the primary from staging.
    region.write(lcs.offset, &[3, 0, 0, 0]).unwrap();
    assert_eq!(region.status(), RegionStatus::Committed);
    assert_eq!(region.generation().unwrap(), 2);
    region.read(lcs.offset, &mut buf).unwrap();
    assert_eq!(buf, [3, 0, 0, 0]);
}

#[test]
fn test_counter_rollback_rejected() {
    let mut mem = [0xFFu8; 2048];
    let mut region = region(&mut mem);
    region.init().unwrap();

    let id = FieldId::Bl2NvCounter(1);
    region.set_counter(id, 9).unwrap();
    let err = region.set_counter(id, 4).unwrap_err();
    assert!(matches!(
        err,
        OtpError::CounterRollback {
            stored: 9,
            requested: 4,
            ..
        }
    ));

    // A raw write that clears bits is a rollback too.
    let entry = TFM.field(id).unwrap();
    assert!(region.write(entry.offset, &[0x01]).is_err());
    assert_eq!(region.read_counter(id).unwrap(), 9);
    assert_eq!(region.generation().unwrap(), 1);
}

#[test]
fn test_typed_access() {
    let mut mem = [0xFFu8; 2048];
    let mut region = region(&mut mem);
    region.init().unwrap();

    region.write_field(FieldId::ImplementationId, b"acme-soc").unwrap();
    let mut buf = [0u8; 8];
    region.read_field(FieldId::ImplementationId, &mut buf).unwrap();
    assert_eq!(&buf, b"acme-soc");

    assert!(matches!(
        region.write_field(FieldId::IakLen, &[0; 8]),
        Err(OtpError::FieldOverrun { size: 4, .. })
    ));
    assert!(matches!(
        region.read_counter(FieldId::Huk),
        Err(OtpError::NotACounter(FieldId::Huk))
    ));
    assert!(matches!(
        region.read_counter(FieldId::Bl1NvCounter0),
        Err(OtpError::FieldAbsent(FieldId::Bl1NvCounter0))
    ));
    assert!(matches!(
        region.set_counter(FieldId::NsNvCounter(0), 513),
        Err(OtpError::CounterOverflow { capacity: 512, .. })
    ));
}

#[test]
fn test_area_too_small() {
    let mut mem = [0xFFu8; 2048];
    let mut region = OtpNvRegion::new(RamFlash::nor(&mut mem), TFM, AreaConfig::contiguous(0, 512));

    assert!(matches!(
        region.init(),
        Err(OtpError::Inconsistent(crate::domain::AreaError::RegionTooLarge {
            required: 980,
            available: 512
        }))
    ));
    assert_eq!(region.status(), RegionStatus::Uninitialized);
}

#[test]
fn test_generation_exhausted() {
    let mut mem = [0u8; 2048];
    let mut region = OtpNvRegion::new(RamFlash::rewritable(&mut mem), TFM, AREA);
    region.init().unwrap();

    let swap = AREA.primary + TFM.swap_count_offset();
    region
        .flash_mut()
        .program(swap, &(ERASED_WORD - 1).to_le_bytes())
        .unwrap();
    let huk = TFM.field(FieldId::Huk).unwrap();
    assert!(matches!(
        region.write(huk.offset, &[1; 4]),
        Err(OtpError::GenerationExhausted)
    ));
}

#[test]
fn test_overlay_clips_to_chunk() {
    let mut chunk = [0u8; 8];
    overlay(&mut chunk, 8, 6, &[1, 2, 3, 4]);
    assert_eq!(chunk, [3, 4, 0, 0, 0, 0, 0, 0]);

    let mut chunk = [0u8; 8];
    overlay(&mut chunk, 8, 14, &[1, 2, 3, 4]);
    assert_eq!(chunk, [0, 0, 0, 0, 0, 0, 1, 2]);

    let mut chunk = [0u8; 8];
    overlay(&mut chunk, 8, 20, &[1, 2, 3, 4]);
    assert_eq!(chunk, [0; 8]);
}
