//! Plain-text triangle soup.
//!
//! One triangle per line: nine coordinates, then optionally the packed flags
//! as a decimal or `0x` hex integer. Blank lines and `#` comments are ignored.

use anyhow::{Context, Result, bail};
use collision_bsp::{TriangleFlags, WorldTriangle};
use log::warn;
use nalgebra::Point3;

pub fn parse(text: &str) -> Result<Vec<WorldTriangle>> {
    let mut triangles = Vec::new();
    let mut skipped = 0;

    for (number, line) in text.lines().enumerate() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let triangle = parse_line(line).with_context(|| format!("line {}", number + 1))?;
        if triangle.is_degenerate() {
            warn!("line {}: skipping degenerate triangle", number + 1);
            skipped += 1;
            continue;
        }
        triangles.push(triangle);
    }

    if skipped > 0 {
        warn!("skipped {skipped} degenerate triangles");
    }
    Ok(triangles)
}

fn parse_line(line: &str) -> Result<WorldTriangle> {
    let fields: Vec<&str> = line
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|f| !f.is_empty())
        .collect();
    if fields.len() != 9 && fields.len() != 10 {
        bail!("expected 9 coordinates and optional flags, found {} fields", fields.len());
    }

    let mut coords = [0.0f32; 9];
    for (slot, field) in coords.iter_mut().zip(&fields) {
        *slot = field
            .parse()
            .with_context(|| format!("bad coordinate {field:?}"))?;
    }
    let flags = match fields.get(9) {
        Some(field) => TriangleFlags::from_bits(parse_flags(field)?),
        None => TriangleFlags::default(),
    };

    let p = |i: usize| Point3::new(coords[i], coords[i + 1], coords[i + 2]);
    Ok(WorldTriangle::with_flags(p(0), p(3), p(6), flags))
}

fn parse_flags(field: &str) -> Result<u32> {
    let parsed = match field.strip_prefix("0x").or_else(|| field.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => field.parse(),
    };
    parsed.with_context(|| format!("bad flags {field:?}"))
}

/// Parses `x,y,z` for command-line points.
pub fn parse_point(s: &str) -> Result<Point3<f32>, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let [x, y, z] = parts.as_slice() else {
        return Err(format!("expected x,y,z, got {s:?}"));
    };
    let coord = |v: &str| v.parse::<f32>().map_err(|e| format!("{v:?}: {e}"));
    Ok(Point3::new(coord(*x)?, coord(*y)?, coord(*z)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_triangles_and_flags() {
        let text = "\
# floor
0 0 0  0 0 1  1 0 0
0,1,0, 0,1,1, 1,1,0, 0x0508   # tagged

";
        let tris = parse(text).unwrap();
        assert_eq!(tris.len(), 2);
        assert_eq!(tris[0].flags(), TriangleFlags::default());
        assert_eq!(tris[1].flags().bits(), 0x0508);
        assert_eq!(tris[1].material_kind(), 5);
        assert_eq!(tris[1].v2(), Point3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn skips_degenerate() {
        let text = "0 0 0 1 1 1 2 2 2\n0 0 0 0 0 1 1 0 0 7\n";
        let tris = parse(text).unwrap();
        assert_eq!(tris.len(), 1);
        assert_eq!(tris[0].flags().bits(), 7);
    }

    #[test]
    fn reports_bad_lines() {
        let err = parse("0 0 0 0 0 1 1 0 0\n0 0 0 0 0 1\n").unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
        assert!(parse("0 0 0 0 0 1 1 0 zero").is_err());
        assert!(parse("0 0 0 0 0 1 1 0 0 0xzz").is_err());
    }

    #[test]
    fn points() {
        assert_eq!(parse_point("1, 2.5,-3").unwrap(), Point3::new(1.0, 2.5, -3.0));
        assert!(parse_point("1,2").is_err());
        assert!(parse_point("1,2,x").is_err());
    }
}
