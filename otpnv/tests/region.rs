//! End-to-end tests for the OTP / NV counter region
//!
//! These tests drive a region through its public API:
//! - Initialization of blank flash and re-initialization after reboot
//! - Read / write round trips and bounds rejection
//! - Monotonic counter enforcement
//! - NOR, rewritable and `embedded-storage` backed devices

use anyhow::Context;
use otpnv::{
    AreaConfig, ErrorKind, FieldId, LayoutConfig, OtpError, OtpNvRegion, RamFlash, RegionLayout,
    RegionStatus, FLASH_NV_COUNTER_AM,
};

const LAYOUT: RegionLayout = RegionLayout::resolve_or_panic(&LayoutConfig::tfm_default());
const AREA: AreaConfig = AreaConfig::contiguous(0x400, 0x400);
const DEVICE: usize = 0x1000;

fn boot(mem: &mut [u8]) -> anyhow::Result<OtpNvRegion<RamFlash<'_>>> {
    let mut region = OtpNvRegion::new(RamFlash::nor(mem), LAYOUT, AREA);
    region.init()?;
    Ok(region)
}

#[test]
fn blank_flash_is_formatted() -> anyhow::Result<()> {
    let mut mem = vec![0xFF; DEVICE];
    let mut region = boot(&mut mem)?;

    assert_eq!(region.status(), RegionStatus::Committed);
    assert_eq!(region.generation()?, 0);

    for entry in LAYOUT.entries().iter().filter(|e| !e.id.is_control()) {
        let mut buf = [0xAAu8; 64];
        let len = (entry.size as usize).min(buf.len());
        region.read(entry.offset, &mut buf[..len])?;
        assert!(buf[..len].iter().all(|&b| b == 0), "{} not zeroed", entry.id);
    }
    for entry in LAYOUT.counters() {
        assert_eq!(region.read_counter(entry.id)?, 0);
    }
    Ok(())
}

#[test]
fn reboot_keeps_committed_state() -> anyhow::Result<()> {
    let mut mem = vec![0xFF; DEVICE];
    let seed = LAYOUT.field(FieldId::EntropySeed).context("entropy seed")?;
    let pattern: Vec<u8> = (0..seed.size as u8).collect();
    {
        let mut region = boot(&mut mem)?;
        region.write(seed.offset, &pattern)?;
        assert_eq!(region.generation()?, 1);
    }

    let mut region = boot(&mut mem)?;
    assert_eq!(region.flash().operations(), 0, "init of a committed region writes nothing");
    assert_eq!(region.generation()?, 1);
    let mut buf = vec![0u8; pattern.len()];
    region.read(seed.offset, &mut buf)?;
    assert_eq!(buf, pattern);
    Ok(())
}

#[test]
fn round_trip_across_fields() -> anyhow::Result<()> {
    let mut mem = vec![0xFF; DEVICE];
    let mut region = boot(&mut mem)?;

    // Straddles the end of `iak_id` and the start of `boot_seed`.
    let boot_seed = LAYOUT.field(FieldId::BootSeed).context("boot seed")?;
    let at = boot_seed.offset - 6;
    let data = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xAA];
    region.write(at, &data)?;

    let mut buf = [0u8; 10];
    region.read(at, &mut buf)?;
    assert_eq!(buf, data);

    let mut seed = [0u8; 4];
    region.read_field(FieldId::BootSeed, &mut seed)?;
    assert_eq!(seed, [0x77, 0x88, 0x99, 0xAA]);
    Ok(())
}

#[test]
fn out_of_bounds_write_changes_nothing() -> anyhow::Result<()> {
    let mut mem = vec![0xFF; DEVICE];
    let mut region = boot(&mut mem)?;
    let sdpk = LAYOUT.field(FieldId::SecureDebugPk).context("sdpk")?;
    region.write(sdpk.offset, &[0x5A; 32])?;
    let before = region.flash().memory().to_vec();

    let err = region.write(LAYOUT.size() - 2, &[0; 4]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    let err = region.write(LAYOUT.size(), &[0]).unwrap_err();
    assert!(matches!(err, OtpError::OutOfBounds { .. }));
    let err = region.read(LAYOUT.size() - 1, &mut [0; 2]).unwrap_err();
    assert!(matches!(err, OtpError::OutOfBounds { .. }));

    assert_eq!(region.flash().memory(), &before[..]);
    let mut buf = [0u8; 32];
    region.read(sdpk.offset, &mut buf)?;
    assert_eq!(buf, [0x5A; 32]);
    Ok(())
}

#[test]
fn counters_only_move_forward() -> anyhow::Result<()> {
    let mut mem = vec![0xFF; DEVICE];
    let mut region = boot(&mut mem)?;
    let id = FieldId::FlashNvCounter(1);

    region.set_counter(id, 5)?;
    let err = region.set_counter(id, 3).unwrap_err();
    assert!(matches!(
        err,
        OtpError::CounterRollback {
            stored: 5,
            requested: 3,
            ..
        }
    ));
    assert_eq!(region.read_counter(id)?, 5);

    region.set_counter(id, 7)?;
    assert_eq!(region.read_counter(id)?, 7);
    // Same value is not a rollback.
    region.set_counter(id, 7)?;
    Ok(())
}

#[test]
fn generic_counters_advance_independently() -> anyhow::Result<()> {
    let mut mem = vec![0xFF; DEVICE];
    let mut region = boot(&mut mem)?;

    for i in 0..FLASH_NV_COUNTER_AM as u8 {
        let id = FieldId::FlashNvCounter(i);
        let n = region.read_counter(id)?;
        region.set_counter(id, n + 1)?;
        assert_eq!(region.read_counter(id)?, n + 1);
        region.set_counter(id, n + 2)?;
        assert_eq!(region.read_counter(id)?, n + 2);
        assert!(region.set_counter(id, n + 1).is_err());
        assert_eq!(region.read_counter(id)?, n + 2);
    }
    assert_eq!(region.generation()?, 2 * FLASH_NV_COUNTER_AM as u32);
    Ok(())
}

#[test]
fn unary_counters_accept_raw_bit_setting() -> anyhow::Result<()> {
    let mut mem = vec![0xFF; DEVICE];
    let mut region = boot(&mut mem)?;
    let counter = LAYOUT.field(FieldId::NsNvCounter(2)).context("ns counter")?;

    region.write(counter.offset + 3, &[0b0001_0001])?;
    assert_eq!(region.read_counter(FieldId::NsNvCounter(2))?, 2);
    region.set_counter(FieldId::NsNvCounter(2), 20)?;
    assert_eq!(region.read_counter(FieldId::NsNvCounter(2))?, 20);
    Ok(())
}

#[test]
fn rewritable_medium() -> anyhow::Result<()> {
    let mut mem = vec![0u8; DEVICE];
    {
        let mut region = OtpNvRegion::new(RamFlash::rewritable(&mut mem), LAYOUT, AREA);
        region.init()?;
        region.set_counter(FieldId::Bl2NvCounter(3), 40)?;
        region.write_field(FieldId::Lcs, &[3, 0, 0, 0])?;
    }

    let mut region = OtpNvRegion::new(RamFlash::rewritable(&mut mem), LAYOUT, AREA);
    region.init()?;
    assert_eq!(region.generation()?, 2);
    assert_eq!(region.read_counter(FieldId::Bl2NvCounter(3))?, 40);
    let mut lcs = [0u8; 4];
    region.read_field(FieldId::Lcs, &mut lcs)?;
    assert_eq!(lcs, [3, 0, 0, 0]);
    Ok(())
}

#[test]
fn minimal_layouts() -> anyhow::Result<()> {
    let counters_only = RegionLayout::resolve(&LayoutConfig::nv_counters_only())?;
    assert_eq!(counters_only.size(), 20);

    let mut mem = vec![0xFF; DEVICE];
    let mut region = OtpNvRegion::new(RamFlash::nor(&mut mem), counters_only, AREA);
    region.init()?;
    region.set_counter(FieldId::FlashNvCounter(2), 1)?;
    assert!(matches!(
        region.read_field(FieldId::Huk, &mut [0; 4]),
        Err(OtpError::FieldAbsent(FieldId::Huk))
    ));
    Ok(())
}

#[cfg(feature = "embedded-storage")]
#[test]
fn backed_by_embedded_storage() -> anyhow::Result<()> {
    use otpnv::NorFlashAdapter;

    let mut mem = vec![0xFF; DEVICE];
    {
        let flash = NorFlashAdapter::new(RamFlash::nor(&mut mem));
        let mut region = OtpNvRegion::new(flash, LAYOUT, AREA);
        region.init()?;
        region.set_counter(FieldId::Bl2NvCounter(0), 12)?;
        // Odd offset and length go through the adapter's bounce buffer.
        region.write(LAYOUT.field(FieldId::Huk).context("huk")?.offset + 1, &[1, 2, 3])?;
    }

    let flash = NorFlashAdapter::new(RamFlash::nor(&mut mem));
    let mut region = OtpNvRegion::new(flash, LAYOUT, AREA);
    region.init()?;
    assert_eq!(region.read_counter(FieldId::Bl2NvCounter(0))?, 12);
    let mut buf = [0u8; 3];
    region.read(5, &mut buf)?;
    assert_eq!(buf, [1, 2, 3]);
    Ok(())
}
