//! Host commands and their argument decoding.
//!
//! Hosts send method calls as a method name plus JSON arguments with
//! camelCase field names. Decoding happens before any state is touched, so
//! a malformed call never changes the view.

use crate::assets::{LoadRequest, ResourceMap};
use crate::error::ViewerError;
use crate::render::color::{ColorConfig, PatchColors, Rgba};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

pub const LOAD_MODEL: &str = "loadModel";
pub const LOAD_ENVIRONMENT: &str = "loadEnvironment";
pub const SET_ZOOM_LEVEL: &str = "setZoomLevel";
pub const UNSELECT_ENTITIES: &str = "unselectEntities";
pub const SET_PART_GROUP_VISIBILITY: &str = "setPartGroupVisibility";

/// A raw method call as it arrives from the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewerCommand<K> {
    LoadModel(LoadModelArgs),
    LoadEnvironment(LoadEnvironmentArgs),
    SetZoomLevel(SetZoomArgs),
    /// `None` clears the whole selection.
    UnselectEntities(Option<Vec<K>>),
    SetPartGroupVisibility(PartGroupVisibilityArgs),
}

impl<K: DeserializeOwned> ViewerCommand<K> {
    pub fn from_call(call: MethodCall) -> Result<Self, ViewerError> {
        let MethodCall { method, arguments } = call;
        match method.as_str() {
            LOAD_MODEL => parse(&method, arguments).map(Self::LoadModel),
            LOAD_ENVIRONMENT => parse(&method, arguments).map(Self::LoadEnvironment),
            SET_ZOOM_LEVEL => parse(&method, arguments).map(Self::SetZoomLevel),
            UNSELECT_ENTITIES => {
                parse::<UnselectArgs<K>>(&method, arguments).map(|args| Self::UnselectEntities(args.into_ids()))
            }
            SET_PART_GROUP_VISIBILITY => {
                parse(&method, arguments).map(Self::SetPartGroupVisibility)
            }
            _ => Err(ViewerError::NotImplemented(method)),
        }
    }
}

fn parse<T: DeserializeOwned>(method: &str, arguments: Value) -> Result<T, ViewerError> {
    serde_json::from_value(arguments)
        .map_err(|err| ViewerError::invalid(format!("{method}: {err}")))
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchColorArg {
    pub name: String,
    pub color: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadModelArgs {
    pub model_bytes: Vec<u8>,
    pub name: String,
    #[serde(default)]
    pub resources: HashMap<String, Vec<u8>>,
    #[serde(default)]
    pub preselected_entities: Option<Vec<String>>,
    #[serde(default)]
    pub selection_color: Option<Vec<f64>>,
    #[serde(default)]
    pub patch_colors: Option<Vec<PatchColorArg>>,
}

impl LoadModelArgs {
    /// Validates colors and builds the load request.
    pub fn into_request(self) -> Result<LoadRequest, ViewerError> {
        if self.name.trim().is_empty() {
            return Err(ViewerError::invalid("loadModel: name must not be empty"));
        }
        let selection_color = self
            .selection_color
            .as_deref()
            .map(Rgba::from_components)
            .transpose()?;
        let patch_colors = self
            .patch_colors
            .map(|patches| {
                patches
                    .into_iter()
                    .map(|patch| Ok((patch.name, Rgba::from_components(&patch.color)?)))
                    .collect::<Result<PatchColors, ViewerError>>()
            })
            .transpose()?;

        let mut request = LoadRequest::new(self.model_bytes, self.name)
            .with_resources(ResourceMap::from(self.resources))
            .with_colors(ColorConfig {
                patch_colors,
                selection_color,
            });
        request.preselected = self.preselected_entities;
        Ok(request)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadEnvironmentArgs {
    pub ibl_bytes: Vec<u8>,
    pub skybox_bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SetZoomArgs {
    pub zoom: f64,
}

/// `unselectEntities` accepts no arguments, a bare id list, or
/// `{ "entityIds": [...] }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum UnselectArgs<K> {
    Ids(Vec<K>),
    Object {
        #[serde(rename = "entityIds")]
        entity_ids: Option<Vec<K>>,
    },
    None(()),
}

impl<K> UnselectArgs<K> {
    fn into_ids(self) -> Option<Vec<K>> {
        match self {
            Self::Ids(ids) => Some(ids),
            Self::Object { entity_ids } => entity_ids,
            Self::None(()) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PartGroup {
    pub name: String,
    pub parts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PartGroupVisibilityArgs {
    pub groups: Vec<PartGroup>,
    pub visibility: HashMap<String, bool>,
}

impl PartGroupVisibilityArgs {
    /// Checks the descriptor before anything is shown or hidden.
    pub fn validate(&self) -> Result<(), ViewerError> {
        for group in &self.groups {
            if group.name.is_empty() {
                return Err(ViewerError::invalid(
                    "setPartGroupVisibility: group name must not be empty",
                ));
            }
            if group.parts.is_empty() {
                return Err(ViewerError::invalid(format!(
                    "setPartGroupVisibility: group {:?} has no parts",
                    group.name
                )));
            }
        }
        for name in self.visibility.keys() {
            if !self.groups.iter().any(|group| &group.name == name) {
                return Err(ViewerError::invalid(format!(
                    "setPartGroupVisibility: unknown group {name:?}"
                )));
            }
        }
        Ok(())
    }
}
