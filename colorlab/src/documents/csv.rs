//! Spreadsheet export of aggregated reports.
//!
//! UTF-8 with a byte-order mark so spreadsheet applications pick the right encoding. One row
//! per report: fixed core columns, then one `foto_N` column per photo up to the largest photo
//! count in the batch. Photo cells hold public URLs under `/images/`.

use std::borrow::Cow;

use url::Url;

use super::aggregator::ReporteConFotos;

const BOM: &[u8] = b"\xEF\xBB\xBF";

pub const CORE_COLUMNS: [&str; 9] = [
    "id",
    "fecha_servicio",
    "hora_servicio",
    "cliente",
    "email_cliente",
    "coloracion",
    "formula",
    "observaciones",
    "precio",
];

/// Render the batch as CSV bytes.
pub fn render_csv(reports: &[ReporteConFotos], public_base_url: &str) -> Vec<u8> {
    let photo_columns = reports.iter().map(|r| r.fotos.len()).max().unwrap_or(0);
    let base_url = public_base_url.trim_end_matches('/');

    let mut out = String::new();

    let header = CORE_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain((1..=photo_columns).map(|n| format!("foto_{n}")));
    push_row(&mut out, header);

    for entry in reports {
        let r = &entry.reporte;
        let core = [
            r.id.to_string(),
            r.fecha_servicio.format("%Y-%m-%d").to_string(),
            r.hora_servicio.clone(),
            r.cliente_nombre.clone(),
            r.cliente_email.clone(),
            r.coloracion_nombre.clone(),
            r.formula.clone(),
            r.observaciones.clone(),
            r.precio.to_string(),
        ];
        let photos = (0..photo_columns).map(|i| {
            entry
                .fotos
                .get(i)
                .map(|foto| photo_url(base_url, &foto.filename))
                .unwrap_or_default()
        });
        push_row(&mut out, core.into_iter().chain(photos));
    }

    let mut bytes = Vec::with_capacity(BOM.len() + out.len());
    bytes.extend_from_slice(BOM);
    bytes.extend_from_slice(out.as_bytes());
    bytes
}

/// Public URL of an uploaded photo, with the filename percent-encoded as one path segment.
fn photo_url(base_url: &str, filename: &str) -> String {
    match Url::parse(base_url) {
        Ok(mut url) if !url.cannot_be_a_base() => {
            if let Ok(mut segments) = url.path_segments_mut() {
                segments.pop_if_empty().push("images").push(filename);
            }
            url.into()
        }
        _ => format!("{base_url}/images/{filename}"),
    }
}

fn push_row(out: &mut String, fields: impl Iterator<Item = String>) {
    for (i, field) in fields.enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&escape(&field));
    }
    out.push_str("\r\n");
}

/// Quote fields containing a delimiter, quote or line break; double embedded quotes.
fn escape(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{sample_foto, sample_reporte};

    fn entry(id: i64, photos: usize) -> ReporteConFotos {
        ReporteConFotos {
            reporte: sample_reporte(id),
            fotos: (0..photos)
                .map(|n| sample_foto(id * 100 + n as i64, id, &format!("r{id}_{n}.jpg")))
                .collect(),
        }
    }

    fn lines(bytes: &[u8]) -> Vec<String> {
        assert!(bytes.starts_with(BOM));
        let text = std::str::from_utf8(&bytes[BOM.len()..]).unwrap();
        assert!(text.ends_with("\r\n"));
        text.trim_end_matches("\r\n").split("\r\n").map(str::to_string).collect()
    }

    #[test]
    fn test_photo_columns_follow_largest_report() {
        let batch = vec![entry(1, 0), entry(2, 1), entry(3, 3)];
        let rows = lines(&render_csv(&batch, "http://localhost:3001/"));

        assert_eq!(
            rows[0],
            "id,fecha_servicio,hora_servicio,cliente,email_cliente,coloracion,formula,observaciones,precio,foto_1,foto_2,foto_3"
        );
        assert_eq!(rows.len(), 4);

        // No photos: three empty trailing cells
        assert!(rows[1].ends_with(",,,"));
        // One photo, then two empty cells
        assert!(rows[2].ends_with(",http://localhost:3001/images/r2_0.jpg,,"));
        assert!(rows[3].ends_with(
            ",http://localhost:3001/images/r3_0.jpg,http://localhost:3001/images/r3_1.jpg,http://localhost:3001/images/r3_2.jpg"
        ));
    }

    #[test]
    fn test_core_values_and_date_format() {
        let rows = lines(&render_csv(&[entry(7, 0)], "http://localhost:3001"));
        assert_eq!(rows.len(), 2);
        assert!(rows[0].ends_with(",precio"));
        assert_eq!(
            rows[1],
            "7,2024-03-15,10:30:00,María López,maria@example.com,Rubio ceniza,7.1 + 20 vol,Sin observaciones,45.50"
        );
    }

    #[test]
    fn test_escaping() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("a,b"), "\"a,b\"");
        assert_eq!(escape("dice \"hola\""), "\"dice \"\"hola\"\"\"");
        assert_eq!(escape("line\nbreak"), "\"line\nbreak\"");

        let mut tricky = entry(1, 0);
        tricky.reporte.observaciones = "Cliente dijo: \"más claro\", la próxima".to_string();
        let bytes = render_csv(&[tricky], "http://x");
        let text = String::from_utf8(bytes[BOM.len()..].to_vec()).unwrap();
        assert!(text.contains(",\"Cliente dijo: \"\"más claro\"\", la próxima\","));
    }

    #[test]
    fn test_photo_filenames_are_percent_encoded() {
        assert_eq!(
            photo_url("http://localhost:3001", "antes y después #2.jpg"),
            "http://localhost:3001/images/antes%20y%20despu%C3%A9s%20%232.jpg"
        );
        assert_eq!(photo_url("https://cdn.example.com/salon", "a?b.png"), "https://cdn.example.com/salon/images/a%3Fb.png");

        let mut batch = entry(4, 0);
        batch.fotos.push(sample_foto(400, 4, "foto 1.jpg"));
        let rows = lines(&render_csv(&[batch], "http://localhost:3001/"));
        assert!(rows[1].ends_with(",http://localhost:3001/images/foto%201.jpg"));
    }

    #[test]
    fn test_empty_batch_is_header_only() {
        let rows = lines(&render_csv(&[], "http://x"));
        assert_eq!(rows, vec![CORE_COLUMNS.join(",")]);
    }
}
