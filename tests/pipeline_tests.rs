//! Pipeline behaviour: fan-out counts, page filtering, manhwa slicing,
//! previews and cancellation.

use xtc_encoder::codec::parse_container;
use xtc_encoder::{
    CancelToken, ConversionOptions, DitherAlgorithm, ImageMode, Margins, Orchestrator,
    Orientation, PageFilter, RasterFrame, Rgba, SourceType, SplitMode, XtcError,
};

fn solid_frame(w: u32, h: u32, value: u8) -> RasterFrame {
    RasterFrame::from_pixel(w, h, Rgba::opaque(value, value, value))
}

/// A vertical strip with a dark band every 16 rows so no slice reads as
/// blank filler.
fn textured_strip(w: u32, h: u32) -> RasterFrame {
    RasterFrame::from_fn(w, h, |_, y| {
        if y % 16 == 0 {
            Rgba::black()
        } else {
            Rgba::white()
        }
    })
}

#[test]
fn planned_count_matches_emitted_count() {
    let cases = [
        (SplitMode::Overlap, 1200u32, 800u32),
        (SplitMode::Overlap, 900, 1400),
        (SplitMode::Split, 1000, 1500),
        (SplitMode::Nosplit, 1600, 800),
    ];
    for (split_mode, w, h) in cases {
        let opts = ConversionOptions {
            orientation: Orientation::Landscape,
            split_mode,
            dither: DitherAlgorithm::None,
            include_overviews: true,
            ..Default::default()
        };
        let orchestrator = Orchestrator::new(opts).unwrap();
        let frame = solid_frame(w, h, 128);

        let pages = orchestrator.process_frame(&frame).unwrap();
        let planned = orchestrator.planned_page_count(w, h);
        assert_eq!(
            pages.len() as u32,
            planned,
            "{:?} on {}x{}",
            split_mode,
            w,
            h
        );
    }
}

#[test]
fn split_mode_halves_portrait_pages() {
    let opts = ConversionOptions {
        orientation: Orientation::Landscape,
        split_mode: SplitMode::Split,
        dither: DitherAlgorithm::None,
        ..Default::default()
    };
    let orchestrator = Orchestrator::new(opts).unwrap();
    let pages = orchestrator
        .process_frame(&solid_frame(1000, 1500, 128))
        .unwrap();
    assert_eq!(pages.len(), 2);
    assert!(pages.iter().all(|p| (p.width, p.height) == (480, 800)));
}

#[test]
fn portrait_mode_is_one_page_per_frame() {
    let opts = ConversionOptions {
        orientation: Orientation::Portrait,
        dither: DitherAlgorithm::None,
        ..Default::default()
    };
    let orchestrator = Orchestrator::new(opts).unwrap();
    let pages = orchestrator
        .process_frame(&solid_frame(1000, 1500, 128))
        .unwrap();
    assert_eq!(pages.len(), 1);
}

#[test]
fn single_image_modes_always_emit_one_device_page() {
    for image_mode in [
        ImageMode::Cover,
        ImageMode::Letterbox,
        ImageMode::Fill,
        ImageMode::Crop,
    ] {
        let opts = ConversionOptions {
            source_type: SourceType::Image,
            orientation: Orientation::Portrait,
            split_mode: SplitMode::Nosplit,
            image_mode,
            dither: DitherAlgorithm::None,
            ..Default::default()
        };
        let orchestrator = Orchestrator::new(opts).unwrap();
        let pages = orchestrator
            .process_frame(&solid_frame(321, 457, 70))
            .unwrap();
        assert_eq!(pages.len(), 1, "{:?}", image_mode);
        assert_eq!((pages[0].width, pages[0].height), (480, 800));
    }
}

#[test]
fn margins_shrink_the_working_crop() {
    // A white page with a black border: 10% margins cut the border away
    // entirely, so the letterboxed page dithers to pure white.
    let frame = RasterFrame::from_fn(1000, 1000, |x, y| {
        if x < 80 || y < 80 || x >= 920 || y >= 920 {
            Rgba::black()
        } else {
            Rgba::white()
        }
    });
    let opts = ConversionOptions {
        orientation: Orientation::Portrait,
        dither: DitherAlgorithm::None,
        margins: Margins::Percent {
            horizontal: 10.0,
            vertical: 10.0,
        },
        ..Default::default()
    };
    let orchestrator = Orchestrator::new(opts).unwrap();
    let bytes = orchestrator.convert(&[frame], None).unwrap();
    let parsed = parse_container(&bytes).unwrap();
    let page = parsed.decode_page(0).unwrap();
    assert!(page.as_slice().iter().all(|&v| v == 255));
}

#[test]
fn auto_margins_trim_border_whitespace() {
    // Black content block floating in white: auto trim should bound it,
    // making the emitted page mostly black.
    let frame = RasterFrame::from_fn(1000, 1000, |x, y| {
        if (300..700).contains(&x) && (200..900).contains(&y) {
            Rgba::black()
        } else {
            Rgba::white()
        }
    });
    let opts = ConversionOptions {
        orientation: Orientation::Portrait,
        dither: DitherAlgorithm::None,
        margins: Margins::Auto,
        ..Default::default()
    };
    let orchestrator = Orchestrator::new(opts).unwrap();
    let bytes = orchestrator.convert(&[frame], None).unwrap();
    let page = parse_container(&bytes).unwrap().decode_page(0).unwrap();

    let black = page.as_slice().iter().filter(|&&v| v == 0).count();
    let ratio = black as f64 / page.as_slice().len() as f64;
    assert!(ratio > 0.9, "black ratio {} after auto trim", ratio);
}

#[test]
fn page_filter_drops_frames_from_output_and_mapping() {
    let opts = ConversionOptions {
        orientation: Orientation::Portrait,
        dither: DitherAlgorithm::None,
        page_filter: PageFilter {
            start: None,
            stop: None,
            skip: vec![2],
        },
        ..Default::default()
    };
    let orchestrator = Orchestrator::new(opts).unwrap();
    let frames = vec![
        solid_frame(480, 800, 255),
        solid_frame(480, 800, 0),
        solid_frame(480, 800, 255),
    ];
    let (bytes, mapping) = orchestrator.convert_with_mapping(&frames, None).unwrap();

    let parsed = parse_container(&bytes).unwrap();
    assert_eq!(parsed.info.page_count, 2);
    assert_eq!(mapping.total_emitted(), 2);
    assert_eq!(mapping.lookup(1).unwrap().page_count, 1);
    assert_eq!(mapping.lookup(2).unwrap().page_count, 0);
    assert_eq!(mapping.lookup(3).unwrap().start_page, 2);

    // The skipped black frame never reached the container.
    for i in 0..2 {
        let page = parsed.decode_page(i).unwrap();
        assert!(page.as_slice().iter().all(|&v| v == 255));
    }
}

#[test]
fn manhwa_strips_slice_with_overlap() {
    let opts = ConversionOptions {
        manhwa: true,
        manhwa_overlap_percent: 50,
        dither: DitherAlgorithm::None,
        ..Default::default()
    };
    let orchestrator = Orchestrator::new(opts).unwrap();

    // 3 strips of 1200 rows at device width: 3600 strip rows total.
    let frames = vec![
        textured_strip(480, 1200),
        textured_strip(480, 1200),
        textured_strip(480, 1200),
    ];
    let (bytes, mapping) = orchestrator.convert_with_mapping(&frames, None).unwrap();
    let parsed = parse_container(&bytes).unwrap();

    // 400-row steps through 3600 rows: slices at 0, 400, ..., 2800 while
    // a full screen remains, then one padded tail page.
    assert_eq!(parsed.info.page_count, 9);
    assert_eq!(mapping.total_emitted(), 9);

    for i in 0..parsed.info.page_count as usize {
        let page = parsed.decode_page(i).unwrap();
        assert_eq!(page.dimensions(), (480, 800));
    }
}

#[test]
fn manhwa_blank_filler_advances_full_screens() {
    let opts = ConversionOptions {
        manhwa: true,
        manhwa_overlap_percent: 50,
        dither: DitherAlgorithm::None,
        ..Default::default()
    };
    let orchestrator = Orchestrator::new(opts).unwrap();

    // Pure white filler: every slice is blank, so steps are full screens
    // and 1600 rows make exactly two pages with no tail.
    let frames = vec![solid_frame(480, 1600, 255)];
    let (bytes, mapping) = orchestrator.convert_with_mapping(&frames, None).unwrap();
    assert_eq!(parse_container(&bytes).unwrap().info.page_count, 2);
    assert_eq!(mapping.total_emitted(), 2);
}

#[test]
fn manhwa_ignores_vertical_margins() {
    let opts = ConversionOptions {
        manhwa: true,
        dither: DitherAlgorithm::None,
        margins: Margins::Percent {
            horizontal: 0.0,
            vertical: 20.0,
        },
        ..Default::default()
    };
    let orchestrator = Orchestrator::new(opts).unwrap();

    // With vertical margins forced to zero, 1600 blank rows still make
    // exactly two full screens.
    let frames = vec![solid_frame(480, 1600, 255)];
    let (bytes, _) = orchestrator.convert_with_mapping(&frames, None).unwrap();
    assert_eq!(parse_container(&bytes).unwrap().info.page_count, 2);
}

#[test]
fn previews_cover_the_first_page_of_each_frame() {
    let opts = ConversionOptions {
        orientation: Orientation::Portrait,
        dither: DitherAlgorithm::None,
        include_overviews: true,
        emit_previews: true,
        ..Default::default()
    };
    let orchestrator = Orchestrator::new(opts).unwrap();
    let pages = orchestrator
        .process_frame(&solid_frame(480, 800, 255))
        .unwrap();
    assert_eq!(pages.len(), 2);
    assert!(pages[0].preview.is_some());
    assert!(pages[1].preview.is_none());
}

#[test]
fn cancellation_surfaces_between_frames() {
    let token = CancelToken::new();
    token.cancel();

    let opts = ConversionOptions {
        orientation: Orientation::Portrait,
        dither: DitherAlgorithm::None,
        ..Default::default()
    };
    let orchestrator = Orchestrator::with_cancel(opts, token).unwrap();
    let result = orchestrator.convert(&[solid_frame(480, 800, 255)], None);
    assert!(matches!(result, Err(XtcError::Cancelled)));
}

#[test]
fn streamed_mode_rejects_manhwa() {
    let opts = ConversionOptions {
        manhwa: true,
        ..Default::default()
    };
    let orchestrator = Orchestrator::new(opts).unwrap();
    let result =
        orchestrator.convert_streamed(&[solid_frame(480, 1600, 255)], None, Vec::new());
    assert!(matches!(result, Err(XtcError::InvalidOption(_))));
}

#[test]
fn tiny_frames_still_produce_device_pages() {
    let opts = ConversionOptions {
        orientation: Orientation::Portrait,
        dither: DitherAlgorithm::None,
        ..Default::default()
    };
    let orchestrator = Orchestrator::new(opts).unwrap();
    let pages = orchestrator.process_frame(&solid_frame(3, 3, 0)).unwrap();
    assert_eq!(pages.len(), 1);
    assert_eq!((pages[0].width, pages[0].height), (480, 800));
}
