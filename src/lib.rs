// Copyright 2025 ModerRAS
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

//! # Image Chat
//!
//! Chat with a hosted multimodal model about an image.
//!
//! A session holds the conversation, the selected image and an optional
//! system instruction. Each question is sent together with the image
//! (downscaled and PNG-encoded) to a model picked from the provider's
//! catalog; throttled requests are retried after a fixed delay.
//!
//! ## Example
//!
//! ```rust,no_run
//! use image_chat::{ChatSession, ModelClient, ModelConfig};
//! use image_chat::attachment::load_path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ModelConfig::default().with_api_key(std::env::var("API_KEY")?);
//!     let client = ModelClient::new(config);
//!
//!     let mut session = ChatSession::new();
//!     session.set_image(load_path("cat.jpg").await?);
//!
//!     let reply = session.submit(&client, "What is in this image?").await?;
//!     println!("{}", reply.content);
//!     Ok(())
//! }
//! ```

pub mod attachment;
pub mod chat;
pub mod gui;
pub mod model;
pub mod settings;

pub use attachment::{EncodedImage, ImageError, SelectedImage};
pub use chat::{ChatMessage, ChatSession, InstructionPreset, Role};
pub use model::{ModelClient, ModelConfig, ModelDescriptor, ModelError};
pub use settings::AppSettings;
