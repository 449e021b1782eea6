use glyphscope::{
    Inspector,
    font_catalog::Step,
    geometry::DisplayPoint,
    inspector::Navigation,
    render_config::{AntiAliasing, FontSize},
};
use image::{Rgba, RgbaImage};

const MARGIN: i32 = 16;

fn main() {
    let mut args = std::env::args().skip(1);
    let path = args
        .next()
        .expect("usage: inspect_glyph <font file> [glyph index] [anti-aliasing]");
    let glyph_index: i64 = args.next().map_or(0, |s| s.parse().expect("glyph index"));
    let anti_aliasing = args
        .next()
        .map(|name| AntiAliasing::from_name(&name).expect("unknown anti-aliasing mode"));

    let inspector = Inspector::new();
    assert_eq!(inspector.load_fonts([path.as_str()]), 1, "failed to load `{}`", path);

    inspector.update_config(|config| {
        config.set_size(FontSize::Pixels(24.0));
        config.set_zoom(12);
        config.set_show_point_indices(true);
        if let Some(mode) = anti_aliasing {
            config.set_anti_aliasing(mode);
        }
    });
    inspector.navigate(Navigation::Glyph(Step::Offset(glyph_index)));

    let face = inspector.current_face().expect("no face selected");
    let render = inspector
        .render_current_glyph()
        .expect("failed to render glyph");
    println!(
        "{} {} ({}) glyph {} {:?}: {} points",
        face.family_name,
        face.style_name,
        face.file_name,
        render.glyph_index,
        render.glyph_name,
        render.markers.len()
    );

    // canvas covering the bitmap and the outline control box
    let mut min = DisplayPoint::new(0.0, 0.0);
    let mut max = DisplayPoint::new(0.0, 0.0);
    if let Some(image) = &render.image {
        let size = image.pixel_size as f32;
        min = min.min(image.origin);
        max = max.max(DisplayPoint::new(
            image.origin.x + image.width as f32 * size,
            image.origin.y + image.height as f32 * size,
        ));
    }
    if let Some(bounds) = render.path.as_ref().and_then(|path| path.bounds()) {
        min = min.min(bounds.min);
        max = max.max(bounds.max);
    }

    let offset_x = -min.x.floor() as i32 + MARGIN;
    let offset_y = -min.y.floor() as i32 + MARGIN;
    let width = (max.x - min.x).ceil() as u32 + 2 * MARGIN as u32;
    let height = (max.y - min.y).ceil() as u32 + 2 * MARGIN as u32;

    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
    let mut put = |x: i32, y: i32, color: Rgba<u8>| {
        let (x, y) = (x + offset_x, y + offset_y);
        if x >= 0 && y >= 0 && (x as u32) < width && (y as u32) < height {
            canvas.put_pixel(x as u32, y as u32, color);
        }
    };

    if let Some(image) = &render.image {
        let size = image.pixel_size as i32;
        for y in 0..image.height {
            for x in 0..image.width {
                let Some(color) = image.pixel(x, y) else {
                    continue;
                };
                let color = Rgba([color.red, color.green, color.blue, color.alpha]);
                for dy in 0..size {
                    for dx in 0..size {
                        put(
                            image.origin.x as i32 + x as i32 * size + dx,
                            image.origin.y as i32 + y as i32 * size + dy,
                            color,
                        );
                    }
                }
            }
        }
    }

    for marker in &render.markers {
        let color = if marker.on_curve {
            Rgba([220, 0, 0, 255])
        } else {
            Rgba([0, 0, 220, 255])
        };
        for dy in -2..=2 {
            for dx in -2..=2 {
                put(marker.position.x as i32 + dx, marker.position.y as i32 + dy, color);
            }
        }
    }

    std::fs::create_dir_all("debug").expect("failed to create output directory");
    canvas
        .save("debug/inspect_glyph.png")
        .expect("failed to save debug image");

    println!("Saved glyph image to debug/inspect_glyph.png");
}
