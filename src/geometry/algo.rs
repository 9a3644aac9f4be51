//! Rasterization primitives. Every routine reports pixels through a
//! caller-supplied closure so the same algorithm can feed point shapes,
//! bounds calculations or plain pixel collection.
//!
//! Line, ellipse and rational bezier code is based on Alois Zingl's
//! "The Beauty of Bresenham's Algorithm" (MIT licensed).

use super::Point;

/// Bresenham line where every step along the major axis emits exactly
/// one pixel. Produces no diagonal "L" doubles.
pub fn line_perfect(x1: i32, y1: i32, x2: i32, y2: i32, mut proc: impl FnMut(i32, i32)) {
    perfect_line_impl(x1, y1, x2, y2, false, &mut proc);
}

/// Variant of [`line_perfect`] that also emits the pixel before every
/// minor-axis step, so stamps of a line brush leave no holes.
pub fn line_perfect_with_fix_for_line_brush(
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
    mut proc: impl FnMut(i32, i32),
) {
    perfect_line_impl(x1, y1, x2, y2, true, &mut proc);
}

fn perfect_line_impl(
    mut x1: i32,
    mut y1: i32,
    mut x2: i32,
    mut y2: i32,
    fix_for_line_brush: bool,
    proc: &mut dyn FnMut(i32, i32),
) {
    let yaxis = (y2 - y1).abs() > (x2 - x1).abs();
    if yaxis {
        std::mem::swap(&mut x1, &mut y1);
        std::mem::swap(&mut x2, &mut y2);
    }

    let w = (x2 - x1).abs() + 1;
    let h = (y2 - y1).abs() + 1;
    let dx = (x2 - x1).signum();
    let dy = (y2 - y1).signum();

    let mut e = 0;
    let mut y = y1;

    // One past the end so a zero-length line still runs once
    let end = x2 + if dx == 0 { 1 } else { dx };
    let step = if dx == 0 { 1 } else { dx };

    let mut emit = |x: i32, y: i32| {
        if yaxis {
            proc(y, x)
        } else {
            proc(x, y)
        }
    };

    let mut x = x1;
    while x != end {
        emit(x, y);

        e += h;
        if e >= w {
            y += dy;
            e -= w;
            if fix_for_line_brush && x + step != end {
                emit(x, y);
            }
        }
        x += step;
    }
}

/// Classic Bresenham line; diagonal steps move both axes at once
pub fn line_continuous(x0: i32, y0: i32, x1: i32, y1: i32, mut proc: impl FnMut(i32, i32)) {
    continuous_line_impl(x0, y0, x1, y1, false, &mut proc);
}

/// Variant of [`line_continuous`] for line brushes; fills the corner of
/// every diagonal step.
pub fn line_continuous_with_fix_for_line_brush(
    x0: i32,
    y0: i32,
    x1: i32,
    y1: i32,
    mut proc: impl FnMut(i32, i32),
) {
    continuous_line_impl(x0, y0, x1, y1, true, &mut proc);
}

fn continuous_line_impl(
    mut x0: i32,
    mut y0: i32,
    x1: i32,
    y1: i32,
    fix_for_line_brush: bool,
    proc: &mut dyn FnMut(i32, i32),
) {
    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        let mut x_changed = false;
        proc(x0, y0);
        let e2 = 2 * err;
        if e2 >= dy {
            if x0 == x1 {
                break;
            }
            err += dy;
            x0 += sx;
            x_changed = true;
        }
        if e2 <= dx {
            if y0 == y1 {
                break;
            }
            err += dx;
            if fix_for_line_brush && x_changed {
                proc(x0, y0);
            }
            y0 += sy;
        }
    }
}

/// Normalizes the ellipse corners and computes the straight pixel runs
/// added to the middle of large ellipses. Returns the total height.
fn adjust_ellipse_args(
    x0: &mut i32,
    y0: &mut i32,
    x1: &mut i32,
    y1: &mut i32,
    h_pixels: &mut i32,
    v_pixels: &mut i32,
) -> i32 {
    *h_pixels = (*h_pixels).max(0);
    *v_pixels = (*v_pixels).max(0);

    if *x0 > *x1 {
        std::mem::swap(x0, x1);
    }
    if *y0 > *y1 {
        std::mem::swap(y0, y1);
    }
    let w = *x1 - *x0 + 1;
    let h = *y1 - *y0 + 1;

    let h_diameter = w - *h_pixels;
    let v_diameter = h - *v_pixels;

    // These sizes look lumpy without an extra straight pixel
    if w == 8 || w == 12 || w == 22 {
        *h_pixels += 1;
    }
    if h == 8 || h == 12 || h == 22 {
        *v_pixels += 1;
    }

    if h_diameter <= 5 {
        *h_pixels = 0;
    }
    if v_diameter <= 5 {
        *v_pixels = 0;
    }

    if h_diameter % 2 == 0 && h_diameter > 5 {
        *h_pixels -= 1;
    }
    if v_diameter % 2 == 0 && v_diameter > 5 {
        *v_pixels -= 1;
    }

    *x1 -= *h_pixels;
    *y1 -= *v_pixels;

    h
}

/// Outline of the ellipse inscribed in the box (x0,y0)-(x1,y1)
pub fn ellipse(
    x0: i32,
    y0: i32,
    x1: i32,
    y1: i32,
    h_pixels: i32,
    v_pixels: i32,
    mut proc: impl FnMut(i32, i32),
) {
    ellipse_impl(x0, y0, x1, y1, h_pixels, v_pixels, &mut proc);
}

fn ellipse_impl(
    mut x0: i32,
    mut y0: i32,
    mut x1: i32,
    mut y1: i32,
    mut hp: i32,
    mut vp: i32,
    proc: &mut dyn FnMut(i32, i32),
) {
    let h = adjust_ellipse_args(&mut x0, &mut y0, &mut x1, &mut y1, &mut hp, &mut vp);

    let a = (x1 - x0).abs() as i64;
    let b = (y1 - y0).abs() as i64;
    let b1 = b & 1;
    let mut dx = 4.0 * (1.0 - a as f64) * (b * b) as f64;
    let mut dy = 4.0 * (b1 + 1) as f64 * (a * a) as f64;
    let mut err = dx + dy + (b1 * a * a) as f64;

    y0 += ((b + 1) / 2) as i32;
    y1 = y0 - b1 as i32;
    let a8 = (8 * a * a) as f64;
    let b8 = (8 * b * b) as f64;

    let initial_y0 = y0;
    let initial_y1 = y1;
    let initial_x0 = x0;
    let initial_x1 = x1 + hp;

    loop {
        proc(x1 + hp, y0 + vp);
        proc(x0, y0 + vp);
        proc(x0, y1);
        proc(x1 + hp, y1);

        let e2 = 2.0 * err;
        if e2 <= dy {
            y0 += 1;
            y1 -= 1;
            dy += a8;
            err += dy;
        }
        if e2 >= dx || 2.0 * err > dy {
            x0 += 1;
            x1 -= 1;
            dx += b8;
            err += dx;
        }
        if x0 > x1 {
            break;
        }
    }

    // Flat ellipses stop too early, finish the tips
    while y0 + vp - y1 + 1 <= h {
        proc(x0 - 1, y0 + vp);
        proc(x1 + 1 + hp, y0 + vp);
        y0 += 1;
        proc(x0 - 1, y1);
        proc(x1 + 1 + hp, y1);
        y1 -= 1;
    }

    if hp > 0 {
        for i in x0..(x1 + hp + 1) {
            proc(i, y1 + 1);
            proc(i, y0 + vp - 1);
        }
    }
    if vp > 0 {
        for i in (initial_y1 + 1)..(initial_y0 + vp) {
            proc(initial_x0, i);
            proc(initial_x1, i);
        }
    }
}

/// Filled ellipse inscribed in the box (x0,y0)-(x1,y1), reported as
/// horizontal runs `(x1, y, x2)`.
pub fn ellipse_fill(
    mut x0: i32,
    mut y0: i32,
    mut x1: i32,
    mut y1: i32,
    mut hp: i32,
    mut vp: i32,
    mut hline: impl FnMut(i32, i32, i32),
) {
    let h = adjust_ellipse_args(&mut x0, &mut y0, &mut x1, &mut y1, &mut hp, &mut vp);

    let a = (x1 - x0).abs() as i64;
    let b = (y1 - y0).abs() as i64;
    let b1 = b & 1;
    let mut dx = 4.0 * (1.0 - a as f64) * (b * b) as f64;
    let mut dy = 4.0 * (b1 + 1) as f64 * (a * a) as f64;
    let mut err = dx + dy + (b1 * a * a) as f64;

    y0 += ((b + 1) / 2) as i32;
    y1 = y0 - b1 as i32;
    let a8 = (8 * a * a) as f64;
    let b8 = (8 * b * b) as f64;

    let initial_y0 = y0;
    let initial_y1 = y1;
    let initial_x0 = x0;
    let initial_x1 = x1 + hp;

    loop {
        hline(x0, y0 + vp, x1 + hp);
        hline(x0, y1, x1 + hp);
        let e2 = 2.0 * err;
        if e2 <= dy {
            y0 += 1;
            y1 -= 1;
            dy += a8;
            err += dy;
        }
        if e2 >= dx || 2.0 * err > dy {
            x0 += 1;
            x1 -= 1;
            dx += b8;
            err += dx;
        }
        if x0 > x1 {
            break;
        }
    }

    while y0 + vp - y1 + 1 < h {
        y0 += 1;
        hline(x0 - 1, y0 + vp, x0 - 1);
        hline(x1 + 1 + hp, y0 + vp, x1 + 1 + hp);
        y1 -= 1;
        hline(x0 - 1, y1, x0 - 1);
        hline(x1 + 1 + hp, y1, x1 + 1 + hp);
    }

    if vp > 0 {
        for i in (initial_y1 + 1)..(initial_y0 + vp) {
            hline(initial_x0, i, initial_x1);
        }
    }
}

/// Plots a limited rational quadratic bezier segment with squared weight `w`
#[allow(clippy::too_many_arguments)]
fn quad_rational_bezier_seg(
    mut x0: i32,
    mut y0: i32,
    x1: i32,
    y1: i32,
    mut x2: i32,
    mut y2: i32,
    mut w: f64,
    proc: &mut dyn FnMut(i32, i32),
) {
    let mut sx = (x2 - x1) as f64;
    let mut sy = (y2 - y1) as f64;
    let mut dx = (x0 - x2) as f64;
    let mut dy = (y0 - y2) as f64;
    let mut xx = (x0 - x1) as f64;
    let mut yy = (y0 - y1) as f64;
    let mut xy = xx * sy + yy * sx;
    let mut cur = xx * sy - yy * sx;

    if cur != 0.0 && w > 0.0 {
        if sx * sx + sy * sy > xx * xx + yy * yy {
            x2 = x0;
            x0 -= dx as i32;
            y2 = y0;
            y0 -= dy as i32;
            cur = -cur;
        }
        xx = 2.0 * (4.0 * w * sx * xx + dx * dx);
        yy = 2.0 * (4.0 * w * sy * yy + dy * dy);
        sx = if x0 < x2 { 1.0 } else { -1.0 };
        sy = if y0 < y2 { 1.0 } else { -1.0 };
        xy = -2.0 * sx * sy * (2.0 * w * xy + dx * dy);

        if cur * sx * sy < 0.0 {
            xx = -xx;
            yy = -yy;
            xy = -xy;
            cur = -cur;
        }
        dx = 4.0 * w * (x1 - x0) as f64 * sy * cur + xx / 2.0 + xy;
        dy = 4.0 * w * (y0 - y1) as f64 * sx * cur + yy / 2.0 + xy;

        if w < 0.5 && (dy > xy || dx < xy) {
            // Flat ellipse, split the curve in half
            let cur = (w + 1.0) / 2.0;
            w = w.sqrt();
            let xy = 1.0 / (w + 1.0);

            let mx = ((x0 as f64 + 2.0 * w * x1 as f64 + x2 as f64) * xy / 2.0 + 0.5).floor() as i32;
            let my = ((y0 as f64 + 2.0 * w * y1 as f64 + y2 as f64) * xy / 2.0 + 0.5).floor() as i32;

            let cx = ((w * x1 as f64 + x0 as f64) * xy + 0.5).floor() as i32;
            let cy = ((y1 as f64 * w + y0 as f64) * xy + 0.5).floor() as i32;
            quad_rational_bezier_seg(x0, y0, cx, cy, mx, my, cur, proc);

            let cx = ((w * x1 as f64 + x2 as f64) * xy + 0.5).floor() as i32;
            let cy = ((y1 as f64 * w + y2 as f64) * xy + 0.5).floor() as i32;
            quad_rational_bezier_seg(mx, my, cx, cy, x2, y2, cur, proc);
            return;
        }

        let mut err = dx + dy - xy;
        loop {
            proc(x0, y0);
            if x0 == x2 && y0 == y2 {
                return;
            }

            let x_step = 2.0 * err > dy;
            let y_step = 2.0 * (err + yy) < -dy;

            if 2.0 * err < dx || y_step {
                y0 += sy as i32;
                dy += xy;
                dx += xx;
                err += dx;
            }
            if 2.0 * err > dx || x_step {
                x0 += sx as i32;
                dx += xy;
                dy += yy;
                err += dy;
            }
            if !(dy <= xy && dx >= xy) {
                break;
            }
        }
    }
    continuous_line_impl(x0, y0, x2, y2, false, proc);
}

fn rotated_ellipse_rect(x0: i32, y0: i32, x1: i32, y1: i32, zd: f64, proc: &mut dyn FnMut(i32, i32)) {
    let mut xd = x1 - x0;
    let mut yd = y1 - y0;
    let mut w = (xd * yd) as f64;

    if zd == 0.0 {
        ellipse_impl(x0, y0, x1, y1, 0, 0, proc);
        return;
    }

    if w != 0.0 {
        w = (w - zd) / (w + w);
    }
    let w = w.clamp(0.0, 1.0);

    xd = (w * xd as f64 + 0.5).floor() as i32;
    yd = (w * yd as f64 + 0.5).floor() as i32;

    quad_rational_bezier_seg(x0, y0 + yd, x0, y0, x0 + xd, y0, 1.0 - w, proc);
    quad_rational_bezier_seg(x0, y0 + yd, x0, y1, x1 - xd, y1, w, proc);
    quad_rational_bezier_seg(x1, y1 - yd, x1, y1, x1 - xd, y1, 1.0 - w, proc);
    quad_rational_bezier_seg(x1, y1 - yd, x1, y0, x0 + xd, y0, w, proc);
}

/// Half-axes of the box surrounding a rotated ellipse plus the rotation
/// term fed to [`rotated_ellipse_rect`].
fn rotated_ellipse_box(a: i32, b: i32, angle: f64) -> (i32, i32, f64) {
    let xd = (a * a) as f64;
    let yd = (b * b) as f64;
    let s = angle.sin();
    let zd = (xd - yd) * s;
    let xd = (xd - zd * s).sqrt();
    let yd = (yd + zd * s).sqrt();

    let a = (xd + 0.5).floor() as i32;
    let b = (yd + 0.5).floor() as i32;
    let zd = if xd * yd != 0.0 {
        zd * a as f64 * b as f64 / (xd * yd)
    } else {
        0.0
    };
    (a, b, 4.0 * zd * angle.cos())
}

/// Outline of an ellipse centered at (cx, cy) with half-axes `a`, `b`
/// rotated by `angle` radians.
pub fn rotated_ellipse(cx: i32, cy: i32, a: i32, b: i32, angle: f64, mut proc: impl FnMut(i32, i32)) {
    let (a, b, zd) = rotated_ellipse_box(a, b, angle);
    rotated_ellipse_rect(cx - a, cy - b, cx + a, cy + b, zd, &mut proc);
}

/// Filled variant of [`rotated_ellipse`], one run per row
pub fn fill_rotated_ellipse(
    cx: i32,
    cy: i32,
    a: i32,
    b: i32,
    angle: f64,
    mut hline: impl FnMut(i32, i32, i32),
) {
    let (a, b, zd) = rotated_ellipse_box(a, b, angle);
    let y0 = cy - b;
    let nrows = (2 * b + 1).max(1) as usize;
    let mut rows: Vec<Option<(i32, i32)>> = vec![None; nrows];

    rotated_ellipse_rect(cx - a, cy - b, cx + a, cy + b, zd, &mut |x, y| {
        let i = (y - y0).clamp(0, nrows as i32 - 1) as usize;
        rows[i] = Some(match rows[i] {
            Some((lo, hi)) => (lo.min(x), hi.max(x)),
            None => (x, x),
        });
    });

    for (i, row) in rows.iter().enumerate() {
        if let Some((x1, x2)) = row {
            hline(*x1, y0 + i as i32, *x2);
        }
    }
}

/// Cubic spline through four control points, approximated with at most
/// 64 line segments reported as `(x1, y1, x2, y2)`.
#[allow(clippy::too_many_arguments)]
pub fn spline(
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    x3: f64,
    y3: f64,
    mut line: impl FnMut(i32, i32, i32, i32),
) {
    const MAX_POINTS: i32 = 64;
    let dist = |x: f64, y: f64| (x * x + y * y).sqrt();

    let npts = ((dist(x1 - x0, y1 - y0) + dist(x2 - x1, y2 - y1) + dist(x3 - x2, y3 - y2)).sqrt()
        * 1.2) as i32;
    let npts = npts.clamp(4, MAX_POINTS);

    let dt = 1.0 / (npts - 1) as f64;
    let dt2 = dt * dt;
    let dt3 = dt2 * dt;

    let xdt2_term = dt2 * 3.0 * (x2 - 2.0 * x1 + x0);
    let ydt2_term = dt2 * 3.0 * (y2 - 2.0 * y1 + y0);
    let xdt3_term = dt3 * (x3 + 3.0 * (-x2 + x1) - x0);
    let ydt3_term = dt3 * (y3 + 3.0 * (-y2 + y1) - y0);

    let dddx = 6.0 * xdt3_term;
    let dddy = 6.0 * ydt3_term;
    let mut ddx = -6.0 * xdt3_term + 2.0 * xdt2_term;
    let mut ddy = -6.0 * ydt3_term + 2.0 * ydt2_term;
    let mut dx = xdt3_term - xdt2_term + 3.0 * dt * (x1 - x0);
    let mut dy = ydt3_term - ydt2_term + dt * 3.0 * (y1 - y0);
    let mut x = x0 + 0.5;
    let mut y = y0 + 0.5;

    let mut out_x1 = x0 as i32;
    let mut out_y1 = y0 as i32;

    for _ in 1..npts {
        ddx += dddx;
        ddy += dddy;
        dx += ddx;
        dy += ddy;
        x += dx;
        y += dy;

        let out_x2 = x as i32;
        let out_y2 = y as i32;
        line(out_x1, out_y1, out_x2, out_y2);
        out_x1 = out_x2;
        out_y1 = out_y2;
    }
}

/// Fills the closed polygon through `points`, edges included. Each row
/// reports its merged runs as `(x1, y, x2)`.
pub fn polygon(points: &[Point], mut hline: impl FnMut(i32, i32, i32)) {
    let Some(first) = points.first() else {
        return;
    };
    let (mut min_y, mut max_y) = (first.y, first.y);
    for p in points {
        min_y = min_y.min(p.y);
        max_y = max_y.max(p.y);
    }

    let rows = (max_y - min_y + 1) as usize;
    let mut spans: Vec<Vec<(i32, i32)>> = vec![Vec::new(); rows];
    let n = points.len();

    // Edge pixels, so thin or degenerate polygons keep their outline
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        line_continuous(a.x, a.y, b.x, b.y, |x, y| {
            spans[(y - min_y) as usize].push((x, x));
        });
    }

    // Interior runs by even-odd crossings, half-open in y
    let mut xs: Vec<f64> = Vec::new();
    for (row, row_spans) in spans.iter_mut().enumerate() {
        let y = min_y + row as i32;
        xs.clear();
        for i in 0..n {
            let a = points[i];
            let b = points[(i + 1) % n];
            if a.y == b.y {
                continue;
            }
            let (lo, hi) = if a.y < b.y { (a, b) } else { (b, a) };
            if y >= lo.y && y < hi.y {
                let t = (y - lo.y) as f64 / (hi.y - lo.y) as f64;
                xs.push(lo.x as f64 + t * (hi.x - lo.x) as f64);
            }
        }
        xs.sort_by(|a, b| a.total_cmp(b));
        for pair in xs.chunks_exact(2) {
            let x1 = pair[0].ceil() as i32;
            let x2 = pair[1].floor() as i32;
            if x1 <= x2 {
                row_spans.push((x1, x2));
            }
        }

        row_spans.sort_unstable();
        let mut current: Option<(i32, i32)> = None;
        for &(s, e) in row_spans.iter() {
            current = match current {
                Some((cs, ce)) if s <= ce + 1 => Some((cs, ce.max(e))),
                Some((cs, ce)) => {
                    hline(cs, y, ce);
                    Some((s, e))
                }
                None => Some((s, e)),
            };
        }
        if let Some((cs, ce)) = current {
            hline(cs, y, ce);
        }
    }
}
