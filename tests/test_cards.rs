mod common;

use cardcrop::cards::{Color, Count, Shading, Shape};
use cardcrop::{AttributeClassifier, CardAttributes, DetectError, classify_all, find_sets};
use common::*;

/// Derives attributes from the crop's ordinal so that cards 1, 2 and 3 form
/// a set; card 12 is unreadable
struct ByOrdinal;

impl AttributeClassifier for ByOrdinal {
    async fn classify(&self, crop: &Crop) -> anyhow::Result<CardAttributes> {
        if crop.ordinal == 12 {
            anyhow::bail!("glare");
        }
        tokio::task::yield_now().await;

        let count = match crop.ordinal {
            1 => Count::One,
            2 => Count::Two,
            3 => Count::Three,
            _ => Count::One,
        };
        let color = if crop.ordinal <= 3 { Color::Red } else { Color::Green };
        Ok(CardAttributes {
            color,
            shape: Shape::Diamond,
            shading: Shading::Empty,
            count,
        })
    }
}

#[tokio::test]
async fn test_classified_crops_feed_set_search() -> anyhow::Result<()> {
    let detection = CardDetector::default().detect(&scene(&standard_layout())).await?;
    let results = classify_all(&ByOrdinal, &detection.crops).await;

    assert_eq!(results.len(), 12);
    assert!(matches!(
        results[11],
        Err(DetectError::Classification { ordinal: 12, .. })
    ));

    let cards: Vec<_> = results.into_iter().filter_map(Result::ok).collect();
    assert_eq!(cards.len(), 11);
    assert_eq!(cards.iter().map(|c| c.ordinal).collect::<Vec<_>>(), (1..=11).collect::<Vec<_>>());

    let sets = find_sets(&cards);
    assert!(sets.contains(&[1, 2, 3]));

    Ok(())
}
