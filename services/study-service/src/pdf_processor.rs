//! PDF Processor
//!
//! Text-layer extraction, scanned-document detection and embedded page
//! image recovery for OCR.

use futures::future;
use image::{DynamicImage, GrayImage, RgbImage};
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::{HashMap, HashSet};
use studyforge_utils::{StudyError, StudyResult};
use tracing::debug;

/// Content-stream operators that paint text.
const TEXT_SHOWING_OPERATORS: &[&str] = &["Tj", "TJ", "'", "\""];

/// Form XObjects nested deeper than this are not followed.
const MAX_FORM_DEPTH: usize = 16;

/// Largest raw image decoded for OCR, in pixels.
const MAX_IMAGE_PIXELS: u64 = 64 * 1024 * 1024;

/// Image recovered from a PDF image XObject
#[derive(Debug, Clone)]
pub struct EmbeddedImage {
    pub object_id: (u32, u16),
    pub image: DynamicImage,
}

/// A content stream together with the form XObjects it can paint by name.
#[derive(Debug, Clone, Default)]
struct ContentTree {
    content: Vec<u8>,
    forms: HashMap<Vec<u8>, ContentTree>,
}

/// PDF processor
#[derive(Debug, Clone, Default)]
pub struct PdfProcessor;

impl PdfProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Extract the text layer, trimmed.
    ///
    /// Runs on the blocking pool; a panic inside the parser surfaces as an error.
    pub async fn extract_text(&self, data: &[u8]) -> StudyResult<String> {
        let data = data.to_vec();
        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&data))
            .await
            .map_err(|e| StudyError::document_processing(format!("PDF text extraction aborted: {}", e)))?
            .map_err(|e| StudyError::document_processing(format!("Failed to extract text from PDF: {}", e)))?;

        Ok(text.trim().to_string())
    }

    /// True when no page of the document carries a single text item.
    ///
    /// Text drawn through form XObjects (`/Fm0 Do`) counts for the page that
    /// paints the form. Every page is decoded on its own blocking task and
    /// the answer is only given once all pages are in.
    pub async fn is_scanned(&self, data: &[u8]) -> StudyResult<bool> {
        let data = data.to_vec();
        let pages = tokio::task::spawn_blocking(move || load_page_contents(&data))
            .await
            .map_err(|e| StudyError::internal(format!("PDF load task failed: {}", e)))??;

        let counts = future::try_join_all(pages.into_iter().map(|(page_number, tree)| async move {
            tokio::task::spawn_blocking(move || count_text_items(&tree))
                .await
                .map_err(|e| StudyError::internal(format!("page {} scan task failed: {}", page_number, e)))?
                .map(|count| (page_number, count))
        }))
        .await?;

        for (page_number, count) in &counts {
            debug!(page = page_number, text_items = count, "Scanned page text layer");
        }

        Ok(counts.iter().all(|(_, count)| *count == 0))
    }

    /// Decode every image XObject in the document, in object order.
    ///
    /// Supported encodings: DCT (JPEG) and uncompressed/Flate streams in
    /// DeviceGray, DeviceRGB or DeviceCMYK. Others are skipped; pages using
    /// them need the rasterizer.
    pub async fn embedded_images(&self, data: &[u8]) -> StudyResult<Vec<EmbeddedImage>> {
        let data = data.to_vec();
        tokio::task::spawn_blocking(move || -> StudyResult<Vec<EmbeddedImage>> {
            let document = Document::load_mem(&data)?;
            let mut images = Vec::new();

            for (object_id, object) in document.objects.iter() {
                let Object::Stream(stream) = object else { continue };
                if !is_image_stream(stream) {
                    continue;
                }

                match decode_image_stream(stream) {
                    Ok(Some(image)) => images.push(EmbeddedImage {
                        object_id: *object_id,
                        image,
                    }),
                    Ok(None) => debug!(?object_id, "Skipping image with unsupported encoding"),
                    Err(e) => debug!(?object_id, error = %e, "Skipping undecodable image"),
                }
            }

            Ok(images)
        })
        .await
        .map_err(|e| StudyError::internal(format!("PDF image task failed: {}", e)))?
    }
}

fn load_page_contents(data: &[u8]) -> StudyResult<Vec<(u32, ContentTree)>> {
    let document = Document::load_mem(data)?;
    let mut pages = Vec::new();
    for (page_number, page_id) in document.get_pages() {
        let forms = match page_resources(&document, page_id) {
            Some(resources) => form_xobjects(&document, resources, &mut HashSet::new(), 0),
            None => HashMap::new(),
        };
        pages.push((
            page_number,
            ContentTree {
                content: document.get_page_content(page_id)?,
                forms,
            },
        ));
    }
    Ok(pages)
}

/// The page's own `/Resources`, or the nearest one inherited from the page tree.
fn page_resources(document: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = document.get_dictionary(page_id).ok();
    let mut depth = 0;

    while let Some(dict) = node {
        if let Ok(resources) = dict.get(b"Resources") {
            return resolve_dictionary(document, resources);
        }
        depth += 1;
        if depth > MAX_FORM_DEPTH {
            break;
        }
        node = dict
            .get(b"Parent")
            .and_then(Object::as_reference)
            .and_then(|id| document.get_dictionary(id))
            .ok();
    }

    None
}

fn resolve_dictionary<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    match object {
        Object::Dictionary(dict) => Some(dict),
        Object::Reference(id) => document.get_dictionary(*id).ok(),
        _ => None,
    }
}

/// Form XObjects reachable from `resources`, keyed by resource name.
///
/// `path` holds the forms currently being expanded so a form that paints
/// itself is cut off instead of recursing forever.
fn form_xobjects(
    document: &Document,
    resources: &Dictionary,
    path: &mut HashSet<ObjectId>,
    depth: usize,
) -> HashMap<Vec<u8>, ContentTree> {
    let mut forms = HashMap::new();
    if depth >= MAX_FORM_DEPTH {
        return forms;
    }
    let Some(xobjects) = resources
        .get(b"XObject")
        .ok()
        .and_then(|object| resolve_dictionary(document, object))
    else {
        return forms;
    };

    for (name, value) in xobjects.iter() {
        let Ok(id) = value.as_reference() else { continue };
        let Ok(Object::Stream(stream)) = document.get_object(id) else { continue };
        if stream.dict.get(b"Subtype").and_then(Object::as_name).ok() != Some(b"Form".as_slice()) {
            continue;
        }
        if !path.insert(id) {
            debug!(?id, "Skipping self-referencing form XObject");
            continue;
        }

        let content = if filters(&stream.dict).is_empty() {
            Ok(stream.content.clone())
        } else {
            stream.decompressed_content()
        };
        match content {
            Ok(content) => {
                let own_resources = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|object| resolve_dictionary(document, object))
                    .unwrap_or(resources);
                let nested = form_xobjects(document, own_resources, path, depth + 1);
                forms.insert(name.clone(), ContentTree { content, forms: nested });
            }
            Err(e) => debug!(?id, error = %e, "Skipping undecodable form XObject"),
        }

        path.remove(&id);
    }

    forms
}

/// Text-showing operators in `tree`, including those inside painted forms.
fn count_text_items(tree: &ContentTree) -> StudyResult<usize> {
    let content = Content::decode(&tree.content)?;
    let mut count = 0;

    for op in &content.operations {
        if TEXT_SHOWING_OPERATORS.contains(&op.operator.as_str()) {
            count += 1;
        } else if op.operator == "Do" {
            let form = op
                .operands
                .first()
                .and_then(|operand| operand.as_name().ok())
                .and_then(|name| tree.forms.get(name));
            if let Some(form) = form {
                count += count_text_items(form)?;
            }
        }
    }

    Ok(count)
}

fn is_image_stream(stream: &Stream) -> bool {
    stream.dict.get(b"Subtype").and_then(Object::as_name).ok() == Some(b"Image".as_slice())
}

fn filters(dict: &Dictionary) -> Vec<Vec<u8>> {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_name().ok().map(|n| n.to_vec()))
            .collect(),
        _ => Vec::new(),
    }
}

fn dimension(dict: &Dictionary, key: &[u8]) -> StudyResult<u32> {
    let value = dict.get(key).and_then(Object::as_i64)?;
    u32::try_from(value).map_err(|_| {
        StudyError::document_processing(format!(
            "invalid image {}: {}",
            String::from_utf8_lossy(key),
            value
        ))
    })
}

fn decode_image_stream(stream: &Stream) -> StudyResult<Option<DynamicImage>> {
    let filters = filters(&stream.dict);
    let filter_names: Vec<&[u8]> = filters.iter().map(|f| f.as_slice()).collect();

    match filter_names.as_slice() {
        [b"DCTDecode"] => Ok(Some(image::load_from_memory(&stream.content)?)),
        [] => decode_raw_pixels(&stream.dict, stream.content.clone()),
        [b"FlateDecode"] => decode_raw_pixels(&stream.dict, inflate_image_stream(stream)?),
        _ => Ok(None),
    }
}

/// lopdf refuses to decompress streams typed as images, so the filter runs
/// on a copy without the subtype.
fn inflate_image_stream(stream: &Stream) -> StudyResult<Vec<u8>> {
    let mut plain = Stream::new(stream.dict.clone(), stream.content.clone());
    plain.dict.remove(b"Subtype");
    Ok(plain.decompressed_content()?)
}

fn decode_raw_pixels(dict: &Dictionary, pixels: Vec<u8>) -> StudyResult<Option<DynamicImage>> {
    let width = dimension(dict, b"Width")?;
    let height = dimension(dict, b"Height")?;
    let bits = dict.get(b"BitsPerComponent").and_then(Object::as_i64).unwrap_or(8);
    let color_space = dict.get(b"ColorSpace").and_then(Object::as_name).unwrap_or(b"DeviceGray");

    let row_bytes = match (color_space, bits) {
        (b"DeviceGray", 8) => width as usize,
        (b"DeviceGray", 1) => (width as usize).div_ceil(8),
        (b"DeviceRGB", 8) => (width as usize).saturating_mul(3),
        (b"DeviceCMYK", 8) => (width as usize).saturating_mul(4),
        _ => return Ok(None),
    };
    if width == 0 || height == 0 {
        return Ok(None);
    }

    if u64::from(width) * u64::from(height) > MAX_IMAGE_PIXELS {
        return Err(StudyError::document_processing(format!(
            "image of {}x{} pixels is too large to decode",
            width, height
        )));
    }
    let required = row_bytes
        .checked_mul(height as usize)
        .ok_or_else(|| StudyError::document_processing(format!("image size {}x{} overflows", width, height)))?;
    if pixels.len() < required {
        return Err(StudyError::document_processing(format!(
            "image stream has {} bytes, {}x{} needs {}",
            pixels.len(),
            width,
            height,
            required
        )));
    }

    let image = match (color_space, bits) {
        (b"DeviceGray", 8) => GrayImage::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8),
        (b"DeviceGray", 1) => GrayImage::from_raw(width, height, unpack_bilevel(&pixels, width, height))
            .map(DynamicImage::ImageLuma8),
        (b"DeviceRGB", 8) => RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8),
        (b"DeviceCMYK", 8) => {
            let rgb = pixels[..required]
                .chunks_exact(4)
                .flat_map(|px| {
                    let k = 255 - px[3] as u16;
                    [px[0], px[1], px[2]].map(|c| ((255 - c as u16) * k / 255) as u8)
                })
                .collect();
            RgbImage::from_raw(width, height, rgb).map(DynamicImage::ImageRgb8)
        }
        _ => None,
    };

    Ok(image)
}

/// Expand 1-bit rows (padded to whole bytes) to 8-bit luma. Callers check
/// that `packed` holds every row before sizing the output from it.
fn unpack_bilevel(packed: &[u8], width: u32, height: u32) -> Vec<u8> {
    let row_bytes = (width as usize).div_ceil(8);
    let mut out = Vec::with_capacity(width as usize * height as usize);

    for row in packed.chunks(row_bytes).take(height as usize) {
        for x in 0..width as usize {
            let byte = row.get(x / 8).copied().unwrap_or(0);
            let bit = (byte >> (7 - (x % 8))) & 1;
            out.push(if bit == 1 { 255 } else { 0 });
        }
    }

    out
}

#[cfg(test)]
pub(crate) mod test_pdfs {
    //! Minimal PDFs assembled with lopdf.

    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, ObjectId, Stream};

    fn text_operations(text: &str) -> Vec<Operation> {
        vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 24.into()]),
            Operation::new("Td", vec![72.into(), 700.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ]
    }

    fn courier(doc: &mut Document) -> ObjectId {
        doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        })
    }

    /// Page tree holding `contents`; `resources` sit on the Pages node and
    /// are inherited by every page.
    fn assemble(mut doc: Document, contents: Vec<Vec<Operation>>, resources: lopdf::Dictionary) -> Vec<u8> {
        let pages_id = doc.new_object_id();
        let resources_id = doc.add_object(resources);

        let mut kids = Vec::new();
        for operations in contents {
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        let pages_dict = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages_dict));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    /// One page per entry; `Some(text)` pages draw that text, `None` pages are blank.
    pub fn build(pages: &[Option<&str>]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let font_id = courier(&mut doc);
        let contents = pages
            .iter()
            .map(|page| page.map(text_operations).unwrap_or_default())
            .collect();

        assemble(doc, contents, dictionary! { "Font" => dictionary! { "F1" => font_id } })
    }

    /// A single page painting one 8x8 gray image and no text.
    pub fn build_scanned_with_image() -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let font_id = courier(&mut doc);
        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 8,
                "Height" => 8,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            // pdf-extract decodes every painted XObject as a content stream,
            // so the pixels are spaces to keep its text pass working
            vec![b' '; 64],
        ));

        let page = vec![
            Operation::new("q", vec![]),
            Operation::new("cm", vec![100.into(), 0.into(), 0.into(), 100.into(), 72.into(), 600.into()]),
            Operation::new("Do", vec!["Im0".into()]),
            Operation::new("Q", vec![]),
        ];
        assemble(
            doc,
            vec![page],
            dictionary! {
                "Font" => dictionary! { "F1" => font_id },
                "XObject" => dictionary! { "Im0" => image_id },
            },
        )
    }

    /// A single page whose only drawing is `/Fm0 Do`; the form draws `text`.
    /// With `self_referencing` the form also lists and paints itself.
    pub fn build_with_form(text: &str, self_referencing: bool) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let font_id = courier(&mut doc);
        let form_id = doc.new_object_id();

        let mut form_operations = text_operations(text);
        let mut form_resources = dictionary! { "Font" => dictionary! { "F1" => font_id } };
        if self_referencing {
            form_operations.push(Operation::new("Do", vec!["Fm0".into()]));
            form_resources.set("XObject", dictionary! { "Fm0" => form_id });
        }
        let form = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                "Resources" => form_resources,
            },
            Content { operations: form_operations }.encode().unwrap(),
        );
        doc.objects.insert(form_id, Object::Stream(form));

        let page = vec![Operation::new("Do", vec!["Fm0".into()])];
        assemble(doc, vec![page], dictionary! { "XObject" => dictionary! { "Fm0" => form_id } })
    }
}
