use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use egui::{pos2, vec2, Pos2, Rect};
use log::{info, warn};

use crate::config::{CladogramConfig, DEFAULT_SKIP_THRESHOLD};
use crate::io;
use crate::tree::cladogram::Cladogram;
use crate::tree::layout::LayoutPolicy;
use crate::tree::query::NEAREST_RADIUS;
use crate::tree::ranges::GlyphKind;
use crate::tree::scene::ScenePrimitive;
use crate::tree::{Tree, TreeModel};

#[derive(Debug, Clone, Parser)]
#[command(
    name = "cladoview",
    about = "Lays out a phylogenetic tree as a cladogram and answers hit-test queries against it."
)]
pub struct AppConfig {
    /// Tree file to load (Newick or Nexus formats).
    #[arg(value_name = "TREE_FILE")]
    pub tree_path: PathBuf,

    /// Which tree of a multi-tree file to lay out.
    #[arg(long, default_value_t = 0)]
    pub tree_index: usize,

    #[arg(long, value_enum, default_value_t = LayoutKind::Orthogonal)]
    pub layout: LayoutKind,

    /// Viewport width in pixels
    #[arg(long, default_value_t = 1100.0)]
    pub width: f32,

    /// Viewport height in pixels
    #[arg(long, default_value_t = 760.0)]
    pub height: f32,

    /// Let rows and columns scale independently instead of keeping square cells.
    #[arg(long)]
    pub free_aspect: bool,

    /// Label rotation in radians.
    #[arg(long, default_value_t = 0.0)]
    pub text_rotation: f32,

    /// Node dot diameter relative to text size (defaults depend on the layout).
    #[arg(long)]
    pub dot_mult: Option<f32>,

    /// Row height in pixels below which leaves start being elided.
    #[arg(long, default_value_t = DEFAULT_SKIP_THRESHOLD)]
    pub skip_threshold: f32,

    /// Sort children by clade size before layout.
    #[arg(long, value_enum)]
    pub ladderize: Option<LadderizeOrder>,

    /// Report the node nearest to this screen point, as `X,Y`.
    #[arg(long, value_name = "X,Y", value_parser = parse_point)]
    pub probe: Option<Pos2>,

    /// Search radius used with `--probe`.
    #[arg(long, default_value_t = NEAREST_RADIUS)]
    pub radius: f32,

    /// List the nodes inside this screen rectangle, as `X0,Y0,X1,Y1`.
    #[arg(long, value_name = "X0,Y0,X1,Y1", value_parser = parse_rect)]
    pub select: Option<Rect>,

    /// Print every drawing command.
    #[arg(long)]
    pub dump_scene: bool,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
pub enum LayoutKind {
    Orthogonal,
    Diagonal,
}

impl From<LayoutKind> for LayoutPolicy {
    fn from(kind: LayoutKind) -> Self {
        match kind {
            LayoutKind::Orthogonal => LayoutPolicy::Orthogonal,
            LayoutKind::Diagonal => LayoutPolicy::Diagonal,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
pub enum LadderizeOrder {
    Increasing,
    Decreasing,
}

impl AppConfig {
    pub fn cladogram_config(&self) -> CladogramConfig {
        CladogramConfig {
            keep_aspect_ratio: !self.free_aspect,
            text_rotation: self.text_rotation,
            dot_mult: self.dot_mult,
            skip_threshold: self.skip_threshold,
        }
    }

    pub fn viewport(&self) -> Rect {
        Rect::from_min_size(Pos2::ZERO, vec2(self.width.max(0.0), self.height.max(0.0)))
    }
}

pub struct App;

impl App {
    pub fn run(config: &AppConfig) -> Result<()> {
        let bundle = io::load_trees(&config.tree_path)?;
        let count = bundle.trees.len();
        let mut tree = bundle
            .trees
            .into_iter()
            .nth(config.tree_index)
            .ok_or_else(|| anyhow!("tree index {} out of range ({count} tree(s) loaded)", config.tree_index))?;
        info!(
            "Loaded tree {} of {count} ({} nodes) from {}",
            config.tree_index,
            tree.nodes.len(),
            config.tree_path.display()
        );

        for line in Self::report(config, &mut tree)? {
            println!("{line}");
        }
        Ok(())
    }

    /// Lay out `tree` per `config` and describe the result line by line.
    pub fn report(config: &AppConfig, tree: &mut Tree) -> Result<Vec<String>> {
        if let Some(order) = config.ladderize {
            tree.ladderize(order == LadderizeOrder::Increasing);
        }

        let mut clado = Cladogram::new(config.layout.into(), config.cladogram_config());
        let leaves = tree.leaves_in_order();
        let viewport = config.viewport();
        clado.update(&*tree, &leaves, viewport);

        let mut lines = Vec::new();
        if let Some(extent) = clado.extent() {
            lines.push(format!(
                "extent: rows={} cols={} max_depth={} gutter={:.3} widest={:?}",
                extent.num_rows, extent.num_cols, extent.max_depth, extent.gutter_width, extent.biggest_label
            ));
        }
        let scale = clado.scale();
        lines.push(format!(
            "scale: row={:.3} col={:.3} text={:.3} dot={:.3} scale=({:.3}, {:.3}) offset=({:.3}, {:.3})",
            scale.row_size,
            scale.col_size,
            scale.text_size,
            scale.dot_width,
            scale.scale_x,
            scale.scale_y,
            scale.offset_x,
            scale.offset_y
        ));
        lines.push(format!(
            "ranges: {} ({} skipped leaves)",
            clado.index().len(),
            clado.skip_set().len()
        ));

        if let Some(pt) = config.probe {
            let hit = clado
                .nearest(pt, config.radius)
                .context("nearest-node query failed")?
                .map(|range| (range.node, range.position));
            match hit {
                Some((node, pos)) => {
                    clado.hover(&*tree, pt)?;
                    lines.push(format!(
                        "nearest: node {node} {:?} at ({:.2}, {:.2})",
                        tree.name(node),
                        pos.x,
                        pos.y
                    ));
                }
                None => {
                    warn!("No node within {} px of ({}, {})", config.radius, pt.x, pt.y);
                    lines.push("nearest: none".to_string());
                }
            }
        }

        if let Some(rect) = config.select {
            let nodes = clado.nodes_in_rect(rect).context("selection query failed")?;
            let labels = clado
                .range_query(rect)?
                .iter()
                .filter(|range| range.kind == GlyphKind::Label)
                .count();
            lines.push(format!("selected: {} node(s), {labels} label(s) {nodes:?}", nodes.len()));
        }

        if config.dump_scene {
            for primitive in clado.scene(&*tree).primitives {
                lines.push(describe(&primitive));
            }
        }

        Ok(lines)
    }
}

fn describe(primitive: &ScenePrimitive) -> String {
    match primitive {
        ScenePrimitive::FillCircle { node, center, radius } => {
            format!("dot {node} ({:.2}, {:.2}) r={radius:.2}", center.x, center.y)
        }
        ScenePrimitive::StrokeLine { node, from, to } => format!(
            "line {node} ({:.2}, {:.2}) -> ({:.2}, {:.2})",
            from.x, from.y, to.x, to.y
        ),
        ScenePrimitive::Text {
            node, text, anchor, size, ..
        } => format!("text {node} {text:?} ({:.2}, {:.2}) size={size:.2}", anchor.x, anchor.y),
    }
}

fn parse_floats<const N: usize>(raw: &str) -> Result<[f32; N], String> {
    let values: Vec<f32> = raw
        .split(',')
        .map(|part| part.trim().parse::<f32>())
        .collect::<Result<_, _>>()
        .map_err(|err| format!("invalid number in {raw:?}: {err}"))?;
    values
        .try_into()
        .map_err(|values: Vec<f32>| format!("expected {N} comma-separated numbers, got {}", values.len()))
}

fn parse_point(raw: &str) -> Result<Pos2, String> {
    let [x, y] = parse_floats::<2>(raw)?;
    Ok(pos2(x, y))
}

fn parse_rect(raw: &str) -> Result<Rect, String> {
    let [x0, y0, x1, y1] = parse_floats::<4>(raw)?;
    Ok(Rect::from_two_pos(pos2(x0, y0), pos2(x1, y1)))
}
