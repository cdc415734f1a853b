//! Downstream consumers of the crops: attribute classification and set search.
//!
//! The classifier itself is an external collaborator; this module only owns
//! the fan-out over crops and the matching rule.

use crate::error::{DetectError, Result};
use crate::models::Crop;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    Red,
    Green,
    Purple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    Diamond,
    Oval,
    Squiggle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shading {
    Solid,
    Striped,
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Count {
    One,
    Two,
    Three,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CardAttributes {
    pub color: Color,
    pub shape: Shape,
    pub shading: Shading,
    pub count: Count,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifiedCard {
    pub ordinal: usize,
    pub attributes: CardAttributes,
}

/// Reads the four attributes off one card crop
pub trait AttributeClassifier: Send + Sync {
    fn classify(&self, crop: &Crop) -> impl Future<Output = anyhow::Result<CardAttributes>> + Send;
}

/// Classify every crop concurrently.
///
/// Results come back in crop order; a failing card yields its own `Err`
/// without affecting the others.
pub async fn classify_all<C>(classifier: &C, crops: &[Crop]) -> Vec<Result<ClassifiedCard>>
where
    C: AttributeClassifier,
{
    let calls = crops.iter().map(|crop| async move {
        let ordinal = crop.ordinal;
        match classifier.classify(crop).await {
            Ok(attributes) => {
                debug!(ordinal, ?attributes, "Classified card");
                Ok(ClassifiedCard { ordinal, attributes })
            }
            Err(e) => {
                warn!(ordinal, error = %e, "Classification failed");
                Err(DetectError::Classification {
                    ordinal,
                    message: e.to_string(),
                })
            }
        }
    });

    join_all(calls).await
}

fn same_or_distinct<T: PartialEq>(a: T, b: T, c: T) -> bool {
    (a == b && b == c) || (a != b && b != c && a != c)
}

fn is_set(a: &CardAttributes, b: &CardAttributes, c: &CardAttributes) -> bool {
    same_or_distinct(a.color, b.color, c.color)
        && same_or_distinct(a.shape, b.shape, c.shape)
        && same_or_distinct(a.shading, b.shading, c.shading)
        && same_or_distinct(a.count, b.count, c.count)
}

/// Every triple of cards forming a set, as ordinals in input order
pub fn find_sets(cards: &[ClassifiedCard]) -> Vec<[usize; 3]> {
    let mut sets = Vec::new();
    for i in 0..cards.len() {
        for j in i + 1..cards.len() {
            for k in j + 1..cards.len() {
                if is_set(&cards[i].attributes, &cards[j].attributes, &cards[k].attributes) {
                    sets.push([cards[i].ordinal, cards[j].ordinal, cards[k].ordinal]);
                }
            }
        }
    }
    sets
}
