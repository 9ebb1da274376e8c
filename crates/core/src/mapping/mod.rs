use serde::{Deserialize, Serialize};

use crate::{
    config::DisplayConfig,
    scene::{ArcSegment, Point, Polyline, Primitive, Scene, Tile},
    RenderMode, WindowBuffer,
};

/// Maps bin indices onto the angular range reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngleAxis {
    pub min_angle: f64,
    pub max_angle: f64,
    pub model_length: usize,
}

impl AngleAxis {
    pub fn new(min_angle: f64, max_angle: f64, model_length: usize) -> Self {
        Self {
            min_angle,
            max_angle,
            model_length,
        }
    }

    /// Angular distance between neighbouring bins, in degrees.
    pub fn step(&self) -> f64 {
        if self.model_length > 1 {
            (self.max_angle - self.min_angle) / (self.model_length - 1) as f64
        } else {
            0.0
        }
    }

    pub fn angle(&self, bin: usize) -> f64 {
        self.min_angle + bin as f64 * self.step()
    }
}

/// Everything besides the buffer that the per-mode geometry depends on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeometryContext {
    pub axis: AngleAxis,
    /// Pull interval in milliseconds.
    pub interval: f64,
    /// Total window time in milliseconds.
    pub duration: f64,
    /// Value-axis bound and waterfall offsets.
    pub display: DisplayConfig,
}

/// Converts the buffer contents into primitives for `mode`.
pub fn build_scene(mode: RenderMode, buffer: &WindowBuffer, ctx: &GeometryContext) -> Scene {
    let rows = buffer.rows();
    let primitives = match mode {
        RenderMode::Line => rows
            .first()
            .map(|row| Primitive::Polyline(cartesian_line(0, row, &ctx.axis, (0.0, 0.0))))
            .into_iter()
            .collect(),
        RenderMode::PolarLines => rows
            .iter()
            .enumerate()
            .map(|(age, row)| Primitive::Polyline(polar_line(age, row, &ctx.axis)))
            .collect(),
        RenderMode::Waterfall => rows
            .iter()
            .enumerate()
            .map(|(age, row)| {
                let offset = (ctx.display.x_offset, ctx.display.y_offset);
                Primitive::Polyline(cartesian_line(age, row, &ctx.axis, offset))
            })
            .collect(),
        RenderMode::PolarArcs => cells(&rows, &ctx.axis)
            .map(|(age, start_angle, end_angle, value)| {
                Primitive::Arc(ArcSegment {
                    age,
                    start_angle,
                    end_angle,
                    inner_radius: age as f64,
                    outer_radius: age as f64 + 1.0,
                    value,
                })
            })
            .collect(),
        RenderMode::Tiled => {
            let seconds = ctx.interval / 1000.0;
            cells(&rows, &ctx.axis)
                .map(|(age, start_angle, end_angle, value)| {
                    Primitive::Tile(Tile {
                        age,
                        start_angle,
                        end_angle,
                        start_time: age as f64 * seconds,
                        end_time: (age + 1) as f64 * seconds,
                        value,
                    })
                })
                .collect()
        }
    };

    Scene {
        mode,
        time_domain: mode.is_windowed().then(|| (0.0, ctx.duration / 1000.0)),
        value_domain: (0.0, ctx.display.y_max),
        primitives,
    }
}

/// `offset` is the per-age `(x, y)` shift; older lines move further back.
fn cartesian_line(age: usize, row: &[f64], axis: &AngleAxis, offset: (f64, f64)) -> Polyline {
    let (dx, dy) = (age as f64 * offset.0, age as f64 * offset.1);
    Polyline {
        age,
        points: row
            .iter()
            .enumerate()
            .map(|(bin, value)| Point {
                x: axis.angle(bin) + dx,
                y: value + dy,
                value: *value,
            })
            .collect(),
    }
}

fn polar_line(age: usize, row: &[f64], axis: &AngleAxis) -> Polyline {
    Polyline {
        age,
        points: row
            .iter()
            .enumerate()
            .map(|(bin, value)| {
                let theta = axis.angle(bin).to_radians();
                Point {
                    x: value * theta.sin(),
                    y: value * theta.cos(),
                    value: *value,
                }
            })
            .collect(),
    }
}

/// Yields `(age, start_angle, end_angle, value)` for every bin of every row,
/// each cell centred on its bin angle.
fn cells<'a>(
    rows: &'a [&'a [f64]],
    axis: &'a AngleAxis,
) -> impl Iterator<Item = (usize, f64, f64, f64)> + 'a {
    let half = axis.step() / 2.0;
    rows.iter().enumerate().flat_map(move |(age, row)| {
        row.iter().enumerate().map(move |(bin, value)| {
            let centre = axis.angle(bin);
            (age, centre - half, centre + half, *value)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BufferShape;

    fn ctx(model_length: usize) -> GeometryContext {
        GeometryContext {
            axis: AngleAxis::new(-90.0, 90.0, model_length),
            interval: 100.0,
            duration: 1000.0,
            display: DisplayConfig {
                x_offset: 2.0,
                y_offset: 2.0,
                ..DisplayConfig::default()
            },
        }
    }

    #[test]
    fn maps_bins_onto_angle_range() {
        let axis = AngleAxis::new(-90.0, 90.0, 5);
        assert_eq!(axis.step(), 45.0);
        assert_eq!(axis.angle(0), -90.0);
        assert_eq!(axis.angle(4), 90.0);

        let single = AngleAxis::new(10.0, 20.0, 1);
        assert_eq!(single.angle(0), 10.0);
    }

    #[test]
    fn line_scene_uses_newest_frame_only() {
        let mut buffer = WindowBuffer::zeroed(BufferShape::Frame, 3, 1);
        buffer.mutate(&[0.2, 0.5, 0.3]).unwrap();

        let scene = build_scene(RenderMode::Line, &buffer, &ctx(3));
        assert_eq!(scene.len(), 1);
        assert!(scene.time_domain.is_none());
        assert_eq!(scene.value_domain, (0.0, 1.0));
        match &scene.primitives[0] {
            Primitive::Polyline(line) => {
                assert_eq!(
                    line.points[1],
                    Point {
                        x: 0.0,
                        y: 0.5,
                        value: 0.5
                    }
                );
            }
            other => panic!("unexpected primitive {other:?}"),
        }
        assert_eq!(scene.peak(), 0.5);
    }

    #[test]
    fn tiled_scene_covers_every_cell() {
        let mut buffer = WindowBuffer::zeroed(BufferShape::Flattened, 3, 4);
        buffer.mutate(&[1.0, 2.0, 3.0]).unwrap();

        let scene = build_scene(RenderMode::Tiled, &buffer, &ctx(3));
        assert_eq!(scene.len(), 12);
        assert_eq!(scene.time_domain, Some((0.0, 1.0)));
        match scene.primitives[2] {
            Primitive::Tile(tile) => {
                assert_eq!(tile.age, 0);
                assert_eq!(tile.start_angle, 45.0);
                assert_eq!(tile.end_angle, 135.0);
                assert_eq!(tile.end_time, 0.1);
                assert_eq!(tile.value, 3.0);
            }
            ref other => panic!("unexpected primitive {other:?}"),
        }
    }

    #[test]
    fn polar_arcs_put_newest_frame_innermost() {
        let buffer = WindowBuffer::zeroed(BufferShape::Flattened, 2, 3);
        let scene = build_scene(RenderMode::PolarArcs, &buffer, &ctx(2));
        let radii: Vec<_> = scene
            .primitives
            .iter()
            .filter_map(|p| match p {
                Primitive::Arc(arc) => Some((arc.age, arc.inner_radius)),
                _ => None,
            })
            .collect();
        assert_eq!(radii, vec![(0, 0.0), (0, 0.0), (1, 1.0), (1, 1.0), (2, 2.0), (2, 2.0)]);
    }

    #[test]
    fn waterfall_shifts_older_lines() {
        let buffer = WindowBuffer::zeroed(BufferShape::History, 2, 3);
        let scene = build_scene(RenderMode::Waterfall, &buffer, &ctx(2));
        match &scene.primitives[2] {
            Primitive::Polyline(line) => {
                assert_eq!(line.age, 2);
                assert_eq!(
                    line.points[0],
                    Point {
                        x: -86.0,
                        y: 4.0,
                        value: 0.0
                    }
                );
            }
            other => panic!("unexpected primitive {other:?}"),
        }
    }

    #[test]
    fn waterfall_peak_ignores_depth_shift() {
        let mut buffer = WindowBuffer::zeroed(BufferShape::History, 3, 4);
        buffer.mutate(&[0.1, 0.4, 0.2]).unwrap();
        buffer.mutate(&[0.3, 0.1, 0.0]).unwrap();

        // The oldest line sits 6 units up, but it only holds zeros.
        let scene = build_scene(RenderMode::Waterfall, &buffer, &ctx(3));
        assert_eq!(scene.peak(), 0.4);
    }

    #[test]
    fn value_domain_follows_y_max() {
        let mut geometry = ctx(2);
        geometry.display.y_max = 0.25;
        let buffer = WindowBuffer::zeroed(BufferShape::Flattened, 2, 2);
        let scene = build_scene(RenderMode::Tiled, &buffer, &geometry);
        assert_eq!(scene.value_domain, (0.0, 0.25));
    }

    #[test]
    fn polar_lines_project_onto_plane() {
        let mut buffer = WindowBuffer::zeroed(BufferShape::History, 3, 2);
        buffer.mutate(&[1.0, 1.0, 1.0]).unwrap();
        let scene = build_scene(RenderMode::PolarLines, &buffer, &ctx(3));
        match &scene.primitives[0] {
            Primitive::Polyline(line) => {
                assert!((line.points[0].x + 1.0).abs() < 1e-12);
                assert!((line.points[1].y - 1.0).abs() < 1e-12);
            }
            other => panic!("unexpected primitive {other:?}"),
        }
    }
}
