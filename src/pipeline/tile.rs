//! Tiling: slice the page raster into overlapping square tiles.
//!
//! Vision models lose small symbols when shown an entire P&ID sheet at
//! once, so the page is processed as a grid of fixed-size tiles. Adjacent
//! tiles overlap so a symbol cut by one tile boundary appears whole in a
//! neighbour; the duplicate detections this creates are collapsed later by
//! [`crate::pipeline::merge`].
//!
//! The grid walks the page row-major with stride
//! `tile_px * (1 - overlap)`. Edge tiles are clipped to the page boundary,
//! never padded, so the union of tile regions is exactly the page extent.

use crate::error::IngestError;
use image::DynamicImage;

/// A square tile of the page raster with its offset coordinates.
///
/// Tiles are derived and disposable: produced here, consumed once by the
/// detection stage, never persisted.
pub struct Tile {
    /// The cropped tile image. Nominally `tile_px` square; smaller at the
    /// right/bottom page edges.
    pub image: DynamicImage,
    /// Left pixel of this tile on the full page.
    pub x_off: u32,
    /// Top pixel of this tile on the full page.
    pub y_off: u32,
}

/// Lazy row-major iterator over the tile grid of a page raster.
///
/// Created by [`slice_page`]. Crops are taken on demand, so tiles that are
/// never consumed never allocate.
#[derive(Debug)]
pub struct TileGrid<'a> {
    img: &'a DynamicImage,
    tile_px: u32,
    stride: u32,
    cols: u32,
    rows: u32,
    next: u32,
}

impl TileGrid<'_> {
    /// Grid shape as `(columns, rows)`.
    pub fn dims(&self) -> (u32, u32) {
        (self.cols, self.rows)
    }
}

impl Iterator for TileGrid<'_> {
    type Item = Tile;

    fn next(&mut self) -> Option<Tile> {
        if self.next >= self.cols * self.rows {
            return None;
        }
        let x = (self.next % self.cols) * self.stride;
        let y = (self.next / self.cols) * self.stride;
        self.next += 1;

        let w = self.tile_px.min(self.img.width() - x);
        let h = self.tile_px.min(self.img.height() - y);
        Some(Tile {
            image: self.img.crop_imm(x, y, w, h),
            x_off: x,
            y_off: y,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.cols * self.rows - self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for TileGrid<'_> {}

/// Slice a page raster into overlapping square tiles.
///
/// `overlap` is the fraction of `tile_px` shared between adjacent tiles;
/// the resulting stride is truncated to whole pixels (1200 px tiles at
/// 15% overlap step 1020 px). The caller is expected to pass a validated
/// overlap in `[0, 1)` — see [`crate::config::IngestConfigBuilder::build`].
///
/// # Errors
/// [`IngestError::EmptyPage`] if the raster has zero extent.
pub fn slice_page(
    img: &DynamicImage,
    tile_px: u32,
    overlap: f64,
) -> Result<TileGrid<'_>, IngestError> {
    let (width, height) = (img.width(), img.height());
    if width == 0 || height == 0 {
        return Err(IngestError::EmptyPage { width, height });
    }

    let stride = (((tile_px as f64) * (1.0 - overlap)) as u32).max(1);
    let cols = width.div_ceil(stride);
    let rows = height.div_ceil(stride);

    Ok(TileGrid {
        img,
        tile_px,
        stride,
        cols,
        rows,
        next: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn blank(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255])))
    }

    #[test]
    fn zero_extent_raster_rejected() {
        let img = blank(0, 0);
        let err = slice_page(&img, 500, 0.15).unwrap_err();
        assert!(matches!(err, IngestError::EmptyPage { .. }));
    }

    #[test]
    fn no_overlap_coordinates() {
        let img = blank(1000, 800);
        let tiles: Vec<Tile> = slice_page(&img, 500, 0.0).unwrap().collect();

        assert_eq!(tiles.len(), 4);
        let expected = [(0, 0), (500, 0), (0, 500), (500, 500)];
        for (tile, (x, y)) in tiles.iter().zip(expected) {
            assert_eq!((tile.x_off, tile.y_off), (x, y));
        }
    }

    #[test]
    fn edge_tiles_are_clipped_not_padded() {
        let img = blank(1000, 800);
        let tiles: Vec<Tile> = slice_page(&img, 500, 0.0).unwrap().collect();

        // Bottom row tiles are 800 - 500 = 300 px tall.
        assert_eq!(tiles[2].image.height(), 300);
        assert_eq!(tiles[3].image.height(), 300);
        assert_eq!(tiles[3].image.width(), 500);
    }

    #[test]
    fn union_of_tiles_covers_page() {
        // Deliberately awkward page size so edge clipping is exercised.
        let img = blank(137, 91);
        let grid = slice_page(&img, 50, 0.15).unwrap();

        let mut covered = vec![false; 137 * 91];
        for t in grid {
            for y in t.y_off..t.y_off + t.image.height() {
                for x in t.x_off..t.x_off + t.image.width() {
                    covered[(y * 137 + x) as usize] = true;
                }
            }
        }
        assert!(covered.iter().all(|&c| c), "tiling left uncovered pixels");
    }

    #[test]
    fn more_overlap_means_more_tiles() {
        let img = blank(1000, 800);
        let low = slice_page(&img, 300, 0.05).unwrap().count();
        let high = slice_page(&img, 300, 0.3).unwrap().count();
        assert!(low < high);
    }

    #[test]
    fn grid_len_matches_yield_count() {
        let img = blank(1234, 777);
        let grid = slice_page(&img, 400, 0.15).unwrap();
        let expected = grid.len();
        assert_eq!(grid.count(), expected);
    }

    #[test]
    fn page_smaller_than_tile_yields_single_clipped_tile() {
        let img = blank(80, 60);
        let tiles: Vec<Tile> = slice_page(&img, 1200, 0.15).unwrap().collect();
        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0].image.width(), 80);
        assert_eq!(tiles[0].image.height(), 60);
        assert_eq!((tiles[0].x_off, tiles[0].y_off), (0, 0));
    }
}
