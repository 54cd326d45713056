use std::io::Cursor;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imaginify_contracts::options::{ArtStyle, AspectRatio};
use imaginify_contracts::service::{ImageService, ServiceError, ServiceRequest};
use imaginify_contracts::Artifact;
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::{map_object, truncate_text};

const UPSCALE_INSTRUCTION: &str = "Upscale this image to a higher resolution. Enhance details, clarity, and overall quality without altering the subject or style.";

const FACE_SWAP_INSTRUCTION: &str = "You are an expert in photo editing. Your task is to replace a face in a target image with a face from a source image. \n\nIMPORTANT: \n- The first image provided is the **target image** where the face needs to be replaced. \n- The second image is the **source image** containing the face to use. \n- Identify the most prominent face in the target image and replace it with the face from the source image. \n- Seamlessly blend the new face, matching lighting, skin tone, shadows, and angle for a natural and realistic result. \n- Do not alter any other part of the target image's background or composition.";

const DRYRUN_LONG_EDGE: u32 = 256;
const DRYRUN_MAX_EDGE: u32 = 2048;

fn style_instruction(style: ArtStyle) -> String {
    format!(
        "Apply the artistic style of \"{}\" to the following image. The core subject, composition, and elements of the image should remain the same, but the entire visual aesthetic, including colors, textures, and brushwork, should be transformed to match the chosen style.",
        style.name()
    )
}

#[derive(Debug, Clone)]
struct ImageBytes {
    bytes: Vec<u8>,
    mime_type: Option<String>,
}

/// Imagen for text-to-image, Gemini image models for everything that starts
/// from an existing picture.
pub struct GoogleImageService {
    api_base: String,
    api_key: Option<String>,
    generate_model: String,
    edit_model: String,
    request_timeout_s: f64,
    transport_retries: usize,
    retry_backoff_s: f64,
    http: HttpClient,
}

impl GoogleImageService {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            api_base: config.api_base.trim().trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            generate_model: config.generate_model.clone(),
            edit_model: config.edit_model.clone(),
            request_timeout_s: config.request_timeout_s,
            transport_retries: config.transport_retries,
            retry_backoff_s: config.retry_backoff_s,
            http: HttpClient::new(),
        }
    }

    fn model_path(model: &str) -> String {
        let trimmed = model.trim();
        if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        }
    }

    fn predict_endpoint(&self) -> String {
        format!(
            "{}/{}:predict",
            self.api_base,
            Self::model_path(&self.generate_model)
        )
    }

    fn generate_content_endpoint(&self) -> String {
        format!(
            "{}/{}:generateContent",
            self.api_base,
            Self::model_path(&self.edit_model)
        )
    }

    fn inline_part(artifact: &Artifact) -> Value {
        json!({
            "inlineData": {
                "mimeType": artifact.mime_type(),
                "data": artifact.to_base64(),
            }
        })
    }

    fn build_predict_payload(prompt: &str, aspect_ratio: AspectRatio) -> Value {
        json!({
            "instances": [{
                "prompt": prompt,
            }],
            "parameters": {
                "sampleCount": 1,
                "aspectRatio": aspect_ratio.label(),
                "outputOptions": {
                    "mimeType": "image/jpeg",
                },
            },
        })
    }

    /// Content parts for image-to-image requests. Text-to-image goes through
    /// `:predict` instead and has no parts.
    fn build_parts(request: &ServiceRequest) -> Option<Vec<Value>> {
        let parts = match request {
            ServiceRequest::Generate { .. } => return None,
            ServiceRequest::Edit { image, instruction } => {
                vec![Self::inline_part(image), json!({ "text": instruction })]
            }
            ServiceRequest::Upscale { image } => {
                vec![
                    Self::inline_part(image),
                    json!({ "text": UPSCALE_INSTRUCTION }),
                ]
            }
            ServiceRequest::StyleTransfer { image, style } => {
                vec![
                    Self::inline_part(image),
                    json!({ "text": style_instruction(*style) }),
                ]
            }
            ServiceRequest::ReplaceFace {
                target,
                source_face,
            } => vec![
                json!({ "text": FACE_SWAP_INSTRUCTION }),
                Self::inline_part(target),
                Self::inline_part(source_face),
            ],
        };
        Some(parts)
    }

    fn build_generate_content_payload(parts: Vec<Value>) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": parts,
            }],
            "generationConfig": {
                "responseModalities": ["IMAGE"],
            },
        })
    }

    fn post_with_transport_retries(
        &self,
        provider: &str,
        endpoint: &str,
        api_key: &str,
        payload: &Value,
    ) -> Result<HttpResponse> {
        for attempt in 0..=self.transport_retries {
            let response = self
                .http
                .post(endpoint)
                .query(&[("key", api_key)])
                .timeout(Duration::from_secs_f64(self.request_timeout_s))
                .json(payload)
                .send();

            match response {
                Ok(ok) => return Ok(ok),
                Err(raw) => {
                    let err = anyhow::Error::new(raw)
                        .context(format!("{provider} request failed ({endpoint})"));
                    if !is_retryable_transport_error(&err) || attempt >= self.transport_retries {
                        return Err(err);
                    }
                    warn!(
                        "{provider} transport retry {}/{} after transient request failure",
                        attempt + 1,
                        self.transport_retries
                    );
                    let delay_s = self.retry_backoff_s * (attempt as f64 + 1.0);
                    thread::sleep(Duration::from_secs_f64(delay_s));
                }
            }
        }

        unreachable!("transport retry loop always returns a response or error")
    }

    fn extract_predictions(response_payload: &Value) -> Result<Vec<ImageBytes>> {
        let mut out = Vec::new();
        let predictions = response_payload
            .get("predictions")
            .or_else(|| response_payload.get("generatedImages"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for row in predictions {
            let Some(obj) = row.as_object() else {
                continue;
            };
            if let Some(encoded) = obj
                .get("bytesBase64Encoded")
                .or_else(|| obj.get("bytes_base64_encoded"))
                .and_then(Value::as_str)
            {
                let bytes = BASE64
                    .decode(encoded.as_bytes())
                    .context("Imagen image base64 decode failed")?;
                out.push(ImageBytes {
                    bytes,
                    mime_type: obj
                        .get("mimeType")
                        .or_else(|| obj.get("mime_type"))
                        .and_then(Value::as_str)
                        .map(str::to_string),
                });
                continue;
            }

            let generated = obj
                .get("image")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            if let Some(encoded) = generated
                .get("imageBytes")
                .or_else(|| generated.get("bytesBase64Encoded"))
                .and_then(Value::as_str)
            {
                let bytes = BASE64
                    .decode(encoded.as_bytes())
                    .context("Imagen generated image base64 decode failed")?;
                out.push(ImageBytes {
                    bytes,
                    mime_type: generated
                        .get("mimeType")
                        .or_else(|| generated.get("mime_type"))
                        .and_then(Value::as_str)
                        .map(str::to_string),
                });
            }
        }
        Ok(out)
    }

    fn extract_image_items(response_payload: &Value) -> Result<Vec<ImageBytes>> {
        let candidates = response_payload
            .get("candidates")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let mut out = Vec::new();

        for candidate in candidates {
            let parts = candidate
                .get("content")
                .and_then(Value::as_object)
                .and_then(|content| content.get("parts"))
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            for part in parts {
                let inline = part
                    .get("inlineData")
                    .or_else(|| part.get("inline_data"))
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                let data = inline
                    .get("data")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if data.is_empty() {
                    continue;
                }
                let bytes = BASE64
                    .decode(data.as_bytes())
                    .context("Gemini image base64 decode failed")?;
                let mime_type = inline
                    .get("mimeType")
                    .or_else(|| inline.get("mime_type"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                out.push(ImageBytes { bytes, mime_type });
            }
        }

        Ok(out)
    }

    fn run_request(&self, request: &ServiceRequest) -> Result<Artifact> {
        let Some(api_key) = self.api_key.as_deref() else {
            bail!("GEMINI_API_KEY, GOOGLE_API_KEY or API_KEY not set");
        };
        let kind = request.kind();

        let (provider, endpoint, payload, default_mime) = match request {
            ServiceRequest::Generate {
                prompt,
                aspect_ratio,
            } => (
                "Imagen",
                self.predict_endpoint(),
                Self::build_predict_payload(prompt, *aspect_ratio),
                "image/jpeg",
            ),
            other => {
                let parts = Self::build_parts(other).unwrap_or_default();
                (
                    "Gemini",
                    self.generate_content_endpoint(),
                    Self::build_generate_content_payload(parts),
                    "image/png",
                )
            }
        };

        debug!(action = kind.as_str(), endpoint = %endpoint, "calling image service");
        let response = self.post_with_transport_retries(provider, &endpoint, api_key, &payload)?;
        let response_payload = response_json_or_error(provider, response)?;
        let images = if provider == "Imagen" {
            Self::extract_predictions(&response_payload)?
        } else {
            Self::extract_image_items(&response_payload)?
        };

        let Some(first) = images.into_iter().next() else {
            bail!("{}", kind.empty_result_message());
        };
        let mime_type = first
            .mime_type
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| default_mime.to_string());
        Ok(Artifact::new(first.bytes, mime_type))
    }
}

impl ImageService for GoogleImageService {
    fn name(&self) -> &str {
        "google"
    }

    fn run(&self, request: &ServiceRequest) -> Result<Artifact, ServiceError> {
        self.run_request(request).map_err(ServiceError::from)
    }
}

/// Offline service that answers every request with a deterministic
/// solid-colour PNG.
#[derive(Debug, Clone, Default)]
pub struct DryrunImageService;

impl DryrunImageService {
    pub fn new() -> Self {
        Self
    }

    fn render(&self, request: &ServiceRequest) -> Result<Artifact> {
        let image = match request {
            ServiceRequest::Generate {
                prompt,
                aspect_ratio,
            } => {
                let (width, height) = aspect_ratio.dims(DRYRUN_LONG_EDGE);
                let seed = format!("generate|{prompt}|{aspect_ratio}");
                solid_image(width, height, &seed)
            }
            ServiceRequest::Upscale { image } => {
                let source = decode_or_blank(image);
                let (width, height) = upscaled_dims(source.width(), source.height());
                source.resize_exact(width, height, FilterType::Triangle)
            }
            ServiceRequest::Edit { image, instruction } => {
                let source = decode_or_blank(image);
                let seed = format!("edit|{}|{instruction}", image.id());
                solid_image(source.width(), source.height(), &seed)
            }
            ServiceRequest::StyleTransfer { image, style } => {
                let source = decode_or_blank(image);
                let seed = format!("style|{}|{style}", image.id());
                solid_image(source.width(), source.height(), &seed)
            }
            ServiceRequest::ReplaceFace {
                target,
                source_face,
            } => {
                let source = decode_or_blank(target);
                let seed = format!("face|{}|{}", target.id(), source_face.id());
                solid_image(source.width(), source.height(), &seed)
            }
        };

        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .context("dryrun image encode failed")?;
        Ok(Artifact::new(bytes, "image/png"))
    }
}

impl ImageService for DryrunImageService {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn run(&self, request: &ServiceRequest) -> Result<Artifact, ServiceError> {
        self.render(request).map_err(ServiceError::from)
    }
}

/// Doubles both edges, shrinking the factor so the long edge stays within
/// the cap and the aspect ratio is kept.
fn upscaled_dims(width: u32, height: u32) -> (u32, u32) {
    let long_edge = width.max(height).max(1);
    let factor = (f64::from(DRYRUN_MAX_EDGE) / f64::from(long_edge)).min(2.0);
    let scale = |edge: u32| ((f64::from(edge) * factor).round() as u32).max(1);
    (scale(width), scale(height))
}

fn decode_or_blank(artifact: &Artifact) -> DynamicImage {
    image::load_from_memory(artifact.bytes()).unwrap_or_else(|_| {
        DynamicImage::ImageRgb8(RgbImage::new(DRYRUN_LONG_EDGE, DRYRUN_LONG_EDGE))
    })
}

fn solid_image(width: u32, height: u32, seed: &str) -> DynamicImage {
    let (r, g, b) = color_from_seed(seed);
    let mut image = RgbImage::new(width.max(1), height.max(1));
    for pixel in image.pixels_mut() {
        *pixel = Rgb([r, g, b]);
    }
    DynamicImage::ImageRgb8(image)
}

fn color_from_seed(seed: &str) -> (u8, u8, u8) {
    let digest = Sha256::digest(seed.as_bytes());
    (digest[0], digest[1], digest[2])
}

fn response_json_or_error(provider: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .with_context(|| format!("{provider} response body read failed"))?;
    if !status.is_success() {
        bail!(
            "{provider} request failed ({code}): {}",
            truncate_text(&body, 512)
        );
    }
    let parsed: Value = serde_json::from_str(&body)
        .with_context(|| format!("{provider} returned invalid JSON payload"))?;
    Ok(parsed)
}

fn is_retryable_transport_error(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<reqwest::Error>()
            .map(|reqwest_err| {
                reqwest_err.is_timeout() || reqwest_err.is_connect() || reqwest_err.is_request()
            })
            .unwrap_or(false)
    })
}

/// Summary of a service request for the event log; image payloads are
/// replaced by their ids.
pub(crate) fn describe_request(request: &ServiceRequest) -> Map<String, Value> {
    let mut payload = map_object(json!({ "action": request.kind().as_str() }));
    match request {
        ServiceRequest::Generate {
            prompt,
            aspect_ratio,
        } => {
            payload.insert("prompt".to_string(), json!(prompt));
            payload.insert("aspect_ratio".to_string(), json!(aspect_ratio.label()));
        }
        ServiceRequest::Edit { image, instruction } => {
            payload.insert("image".to_string(), json!(image.id()));
            payload.insert("prompt".to_string(), json!(instruction));
        }
        ServiceRequest::Upscale { image } => {
            payload.insert("image".to_string(), json!(image.id()));
        }
        ServiceRequest::StyleTransfer { image, style } => {
            payload.insert("image".to_string(), json!(image.id()));
            payload.insert("style".to_string(), json!(style.name()));
        }
        ServiceRequest::ReplaceFace {
            target,
            source_face,
        } => {
            payload.insert("image".to_string(), json!(target.id()));
            payload.insert("source_face".to_string(), json!(source_face.id()));
        }
    }
    payload
}
