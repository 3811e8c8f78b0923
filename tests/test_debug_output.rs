mod common;

use common::*;
use image::GenericImageView;

#[test]
fn stage_images_are_written_per_region() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let out = dir.path().join("debug");
    let pipeline = Pipeline::new(BorderBlackDecoder).with_debug(&out)?;

    let frame = stripe_block_frame();
    let result = pipeline.process(&frame, &DetectionBox::full_frame(120, 60))?;
    assert_eq!(result.stage, Stage::Masked);

    let region = out.join("region_001");
    for name in ["00_region.png", "02_mask.png", "03_masked.png", "04_final.png"] {
        assert!(region.join(name).is_file(), "missing {name}");
    }
    // the estimate was 0, so nothing was rotated
    assert!(!region.join("01_rotated.png").exists());

    let mask = image::open(region.join("02_mask.png"))?.to_luma8();
    assert_eq!(mask.dimensions(), (120, 60));
    assert_eq!(mask.get_pixel(0, 0)[0], 0);
    assert_eq!(mask.get_pixel(60, 25)[0], 255);
    Ok(())
}

#[test]
fn rotated_stage_is_dumped() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let pipeline = Pipeline::new(StripeDecoder).with_debug(dir.path())?;

    let frame = barcode_frame(200, 80, 12.0);
    pipeline.process(&frame, &DetectionBox::full_frame(200, 80))?;

    let region = dir.path().join("region_001");
    assert!(region.join("01_rotated.png").is_file());
    assert!(region.join("04_final.png").is_file());
    Ok(())
}

#[test]
fn frame_regions_are_numbered_in_box_order() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let pipeline = Pipeline::new(CountingDecoder::always()).with_debug(dir.path())?;
    let frame = barcode_frame(200, 80, 0.0);
    let boxes = [
        DetectionBox::new(0, 0, 150, 60),
        DetectionBox::new(300, 10, 320, 20),
        DetectionBox::new(20, 10, 200, 80),
    ];

    for round in 0..3 {
        let results = pipeline.process_frame(&frame, &boxes)?;
        assert_eq!(results.len(), 2);

        let base = round * 3;
        let first = dir.path().join(format!("region_{:03}", base + 1));
        let skipped = dir.path().join(format!("region_{:03}", base + 2));
        let last = dir.path().join(format!("region_{:03}", base + 3));
        assert_eq!(image::open(first.join("00_region.png"))?.dimensions(), (150, 60));
        assert!(!skipped.exists());
        assert_eq!(image::open(last.join("00_region.png"))?.dimensions(), (180, 70));
    }
    Ok(())
}

#[test]
fn non_empty_debug_directory_is_refused() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    std::fs::write(dir.path().join("leftover.png"), b"")?;

    let err = Pipeline::new(StripeDecoder)
        .with_debug(dir.path())
        .err()
        .expect("non-empty directory must be refused");
    assert!(matches!(err, BarcodeError::DebugDirNotEmpty(_)));
    Ok(())
}
