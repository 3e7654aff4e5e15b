//! Text rendering of a board snapshot.
//!
//! Each layer is printed as a grid of `index:label` cells, bottom layer
//! first. `*` marks the selected tile, `!` a rejected pair.

use pyramid_core::BoardView;
use pyramid_types::{Layer, Tile, TileGroup};
use std::fmt::Write;

fn group_abbrev(group: TileGroup) -> &'static str {
    match group {
        TileGroup::Bamboo => "Bam",
        TileGroup::Chars => "Chr",
        TileGroup::Circles => "Cir",
        TileGroup::Winds => "Wnd",
        TileGroup::Dragons => "Drg",
        TileGroup::Flowers => "Flw",
        TileGroup::Seasons => "Ssn",
        TileGroup::Unknown(_) => "???",
    }
}

/// Short label for one cell.
pub fn tile_label(byte: u8) -> String {
    match Tile::from_byte(byte) {
        Tile::Empty => "..".to_string(),
        Tile::Face { group, value } => format!("{}{}", group_abbrev(group), value),
    }
}

fn marker(view: &BoardView, index: usize) -> char {
    if view.selected == Some(index) {
        '*'
    } else if view.highlighted.contains(&index) {
        '!'
    } else {
        ' '
    }
}

/// Render every layer and a status line.
pub fn board(view: &BoardView) -> String {
    let mut out = String::new();
    for layer in Layer::ALL {
        let range = layer.range();
        let _ = writeln!(
            out,
            "{:?} ({}x{}, {}..{})",
            layer,
            layer.side(),
            layer.side(),
            range.start,
            range.end - 1
        );
        for row in 0..layer.side() {
            out.push(' ');
            for col in 0..layer.side() {
                let index = layer.start() + row * layer.side() + col;
                let byte = view.tiles.get(index).copied().unwrap_or(0);
                let _ = write!(
                    out,
                    " {:>2}{}{:<6}",
                    index,
                    marker(view, index),
                    tile_label(byte)
                );
            }
            out.push('\n');
        }
    }
    let _ = write!(out, "{} tiles left", view.remaining);
    if let Some(index) = view.selected {
        let _ = write!(out, ", selected {}", index);
    }
    out.push('\n');
    out
}
