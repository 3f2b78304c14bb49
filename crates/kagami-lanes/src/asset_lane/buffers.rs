// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Buffer resolution shared by the glTF-based loaders.
//!
//! Avatars and clips are expected to be self-contained: buffers come from the
//! GLB binary chunk or from base64 data URIs. External file references are
//! rejected.

use base64::Engine;

/// Loads the bytes of every buffer declared by the document, in index order.
pub(crate) fn load_buffer_data(gltf: &gltf::Gltf) -> Result<Vec<Vec<u8>>, String> {
    let mut buffer_data = Vec::new();
    for buffer in gltf.buffers() {
        match buffer.source() {
            gltf::buffer::Source::Bin => {
                let blob = gltf
                    .blob
                    .as_deref()
                    .ok_or("GLB file references binary chunk but it is missing")?;
                buffer_data.push(blob.to_vec());
            }
            gltf::buffer::Source::Uri(uri) => {
                if uri.starts_with("data:") {
                    buffer_data.push(decode_data_uri(uri)?);
                } else {
                    return Err(format!("external buffer '{uri}' is not supported"));
                }
            }
        }
        if buffer_data[buffer.index()].len() < buffer.length() {
            return Err(format!(
                "buffer {} is shorter than its declared length ({} < {})",
                buffer.index(),
                buffer_data[buffer.index()].len(),
                buffer.length()
            ));
        }
    }
    Ok(buffer_data)
}

/// Decodes a base64 `data:` URI of any media type.
pub(crate) fn decode_data_uri(uri: &str) -> Result<Vec<u8>, String> {
    let payload = uri
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
        .map(|(_, data)| data)
        .ok_or_else(|| format!("Unsupported data URI format: {uri:.40}"))?;
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| format!("invalid base64 payload: {e}"))
}

/// Returns the bytes of a buffer view, bounds-checked.
pub(crate) fn view_bytes<'a>(
    buffers: &'a [Vec<u8>],
    view: &gltf::buffer::View<'_>,
) -> Result<&'a [u8], String> {
    let buffer = buffers
        .get(view.buffer().index())
        .ok_or_else(|| format!("buffer view {} has no buffer", view.index()))?;
    let start = view.offset();
    let end = start + view.length();
    buffer
        .get(start..end)
        .ok_or_else(|| format!("buffer view {} is out of bounds", view.index()))
}

/// Reads the JSON chunk of a GLB container, or returns the bytes unchanged
/// for a plain `.gltf` document.
pub(crate) fn json_chunk(bytes: &[u8]) -> Result<std::borrow::Cow<'_, [u8]>, String> {
    if bytes.starts_with(b"glTF") {
        let glb = gltf::Glb::from_slice(bytes).map_err(|e| e.to_string())?;
        Ok(glb.json)
    } else {
        Ok(std::borrow::Cow::Borrowed(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_with_any_media_type() {
        let decoded = decode_data_uri("data:image/png;base64,AAEC").expect("valid uri");
        assert_eq!(decoded, vec![0, 1, 2]);
        let decoded =
            decode_data_uri("data:application/octet-stream;base64,AAEC").expect("valid uri");
        assert_eq!(decoded, vec![0, 1, 2]);
    }

    #[test]
    fn data_uri_without_base64_marker_is_rejected() {
        assert!(decode_data_uri("data:text/plain,hello").is_err());
    }
}
