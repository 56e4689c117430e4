//! Page layout for image-to-PDF packing.

use crate::config::{Orientation, PageLayout};
use serde::Serialize;

/// Output page size in points, orientation already applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageBox {
    pub width: f32,
    pub height: f32,
}

/// Where an image lands on its page, in points from the bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Page box for `orientation`; landscape swaps width and height.
pub fn page_box(layout: &PageLayout, orientation: Orientation) -> PageBox {
    let (short, long) = if layout.width_pt <= layout.height_pt {
        (layout.width_pt, layout.height_pt)
    } else {
        (layout.height_pt, layout.width_pt)
    };
    match orientation {
        Orientation::Portrait => PageBox {
            width: short,
            height: long,
        },
        Orientation::Landscape => PageBox {
            width: long,
            height: short,
        },
    }
}

/// Scale an image of `width × height` pixels to fill `page` as far as its
/// aspect ratio allows, centred.
pub fn fit_image(width: u32, height: u32, page: PageBox) -> Placement {
    if width == 0 || height == 0 {
        return Placement {
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
        };
    }
    let scale = (page.width / width as f32).min(page.height / height as f32);
    let w = width as f32 * scale;
    let h = height as f32 * scale;
    Placement {
        x: (page.width - w) / 2.0,
        y: (page.height - h) / 2.0,
        width: w,
        height: h,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landscape_swaps_dimensions() {
        let a4 = PageLayout::a4();
        let portrait = page_box(&a4, Orientation::Portrait);
        let landscape = page_box(&a4, Orientation::Landscape);
        assert_eq!(portrait.width, landscape.height);
        assert_eq!(portrait.height, landscape.width);
        assert!(portrait.width < portrait.height);
    }

    #[test]
    fn wide_image_fills_width_and_is_centred_vertically() {
        let page = PageBox {
            width: 100.0,
            height: 200.0,
        };
        let p = fit_image(400, 100, page);
        assert_eq!(p.width, 100.0);
        assert_eq!(p.height, 25.0);
        assert_eq!(p.x, 0.0);
        assert_eq!(p.y, 87.5);
    }

    #[test]
    fn small_image_is_scaled_up() {
        let page = PageBox {
            width: 100.0,
            height: 100.0,
        };
        let p = fit_image(10, 20, page);
        assert_eq!((p.width, p.height), (50.0, 100.0));
        assert_eq!(p.x, 25.0);
    }

    #[test]
    fn zero_sized_image_has_empty_placement() {
        let page = PageBox {
            width: 10.0,
            height: 10.0,
        };
        assert_eq!(fit_image(0, 5, page).width, 0.0);
    }
}
