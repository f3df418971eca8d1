use rand::distributions::{Distribution, WeightedError, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParcelCategory {
    Residential,
    Commercial,
    Industrial,
    MixedUse,
}

impl ParcelCategory {
    pub const ALL: [ParcelCategory; 4] = [
        ParcelCategory::Residential,
        ParcelCategory::Commercial,
        ParcelCategory::Industrial,
        ParcelCategory::MixedUse,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingType {
    House,
    Apartment,
    Shop,
    Office,
    Factory,
    Warehouse,
}

impl BuildingType {
    pub const ALL: [BuildingType; 6] = [
        BuildingType::House,
        BuildingType::Apartment,
        BuildingType::Shop,
        BuildingType::Office,
        BuildingType::Factory,
        BuildingType::Warehouse,
    ];
}

/// Selection probabilities, in the order of [`ParcelCategory::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CategoryWeights {
    pub residential: f64,
    pub commercial: f64,
    pub industrial: f64,
    pub mixed_use: f64,
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            residential: 0.4,
            commercial: 0.3,
            industrial: 0.2,
            mixed_use: 0.1,
        }
    }
}

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

impl CategoryWeights {
    pub fn as_array(&self) -> [f64; 4] {
        [
            self.residential,
            self.commercial,
            self.industrial,
            self.mixed_use,
        ]
    }

    pub fn validate(&self) -> Result<(), ParcelError> {
        let weights = self.as_array();
        for (category, weight) in ParcelCategory::ALL.iter().zip(weights) {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ParcelError::InvalidWeight {
                    category: *category,
                    weight,
                });
            }
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ParcelError::WeightSum(sum));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ParcelRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl ParcelRegion {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parcel {
    pub number: u32,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    #[serde(rename = "type")]
    pub category: ParcelCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub building_type: Option<BuildingType>,
}

impl Parcel {
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x
            && y >= self.y
            && u64::from(x) < u64::from(self.x) + u64::from(self.width)
            && u64::from(y) < u64::from(self.y) + u64::from(self.height)
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Parcel covering tile `(x, y)`, if any.
pub fn parcel_at(parcels: &[Parcel], x: u32, y: u32) -> Option<&Parcel> {
    parcels.iter().find(|parcel| parcel.contains(x, y))
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParcelError {
    #[error("parcel cell size must be positive")]
    ZeroCellSize,
    #[error("weight for {category:?} must be finite and non-negative, got {weight}")]
    InvalidWeight {
        category: ParcelCategory,
        weight: f64,
    },
    #[error("category weights must sum to 1, got {0}")]
    WeightSum(f64),
    #[error("region at ({x}, {y}) sized {width}x{height} extends past the u32 coordinate range")]
    RegionOverflow {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
    #[error("region would produce {0} parcels, more than can be numbered")]
    TooManyParcels(u64),
    #[error("invalid weight table")]
    Distribution(#[from] WeightedError),
}

/// Number of parcels `generate` yields: `ceil(W/c) * ceil(H/c)`.
pub fn expected_parcel_count(region: ParcelRegion, cell_size: u32) -> Option<u64> {
    if cell_size == 0 {
        return None;
    }
    let columns = u64::from(region.width.div_ceil(cell_size));
    let rows = u64::from(region.height.div_ceil(cell_size));
    Some(columns * rows)
}

#[derive(Debug, Clone)]
pub struct ParcelGridGenerator {
    weights: CategoryWeights,
    distribution: WeightedIndex<f64>,
    assign_buildings: bool,
    first_number: u32,
}

impl ParcelGridGenerator {
    pub fn new(weights: CategoryWeights, assign_buildings: bool) -> Result<Self, ParcelError> {
        weights.validate()?;
        let distribution = WeightedIndex::new(weights.as_array())?;
        Ok(Self {
            weights,
            distribution,
            assign_buildings,
            first_number: 1,
        })
    }

    pub fn with_first_number(mut self, first_number: u32) -> Self {
        self.first_number = first_number;
        self
    }

    pub fn weights(&self) -> &CategoryWeights {
        &self.weights
    }

    /// Tiles `region` with `cell_size` squares in row-major order from its
    /// top-left corner. Cells on the right and bottom edges are clipped to
    /// the region.
    pub fn generate(
        &self,
        region: ParcelRegion,
        cell_size: u32,
        rng: &mut impl Rng,
    ) -> Result<Vec<Parcel>, ParcelError> {
        if region.x.checked_add(region.width).is_none()
            || region.y.checked_add(region.height).is_none()
        {
            return Err(ParcelError::RegionOverflow {
                x: region.x,
                y: region.y,
                width: region.width,
                height: region.height,
            });
        }
        let count = expected_parcel_count(region, cell_size).ok_or(ParcelError::ZeroCellSize)?;
        let last_offset = count.saturating_sub(1);
        if u64::from(self.first_number) + last_offset > u64::from(u32::MAX)
            || usize::try_from(count).is_err()
        {
            return Err(ParcelError::TooManyParcels(count));
        }

        let mut parcels = Vec::with_capacity(count as usize);
        let mut number = self.first_number;
        for row in 0..region.height.div_ceil(cell_size) {
            let offset_y = row * cell_size;
            let height = cell_size.min(region.height - offset_y);
            for column in 0..region.width.div_ceil(cell_size) {
                let offset_x = column * cell_size;
                let width = cell_size.min(region.width - offset_x);
                let category = ParcelCategory::ALL[self.distribution.sample(rng)];
                let building_type = self
                    .assign_buildings
                    .then(|| BuildingType::ALL[rng.gen_range(0..BuildingType::ALL.len())]);
                parcels.push(Parcel {
                    number,
                    x: region.x + offset_x,
                    y: region.y + offset_y,
                    width,
                    height,
                    category,
                    building_type,
                });
                number = number.wrapping_add(1);
            }
        }

        debug!(
            parcels = parcels.len(),
            width = region.width,
            height = region.height,
            cell_size,
            "parcels_generated"
        );
        Ok(parcels)
    }

    pub fn generate_full_map(
        &self,
        world_width: u32,
        world_height: u32,
        cell_size: u32,
        rng: &mut impl Rng,
    ) -> Result<Vec<Parcel>, ParcelError> {
        self.generate(
            ParcelRegion::new(0, 0, world_width, world_height),
            cell_size,
            rng,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn generator() -> ParcelGridGenerator {
        ParcelGridGenerator::new(CategoryWeights::default(), true).expect("generator")
    }

    fn overlaps(a: &Parcel, b: &Parcel) -> bool {
        a.x < b.x + b.width && b.x < a.x + a.width && a.y < b.y + b.height && b.y < a.y + a.height
    }

    #[test]
    fn parcels_cover_region_exactly_with_sequential_numbers() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let region = ParcelRegion::new(3, 5, 23, 10);
        let parcels = generator().generate(region, 4, &mut rng).expect("parcels");

        assert_eq!(parcels.len(), 6 * 3);
        assert_eq!(
            expected_parcel_count(region, 4),
            Some(parcels.len() as u64)
        );
        for (index, parcel) in parcels.iter().enumerate() {
            assert_eq!(parcel.number, index as u32 + 1);
            assert!(parcel.building_type.is_some());
        }
        let area: u64 = parcels.iter().map(Parcel::area).sum();
        assert_eq!(area, 23 * 10);
        for (i, a) in parcels.iter().enumerate() {
            for b in &parcels[i + 1..] {
                assert!(!overlaps(a, b), "{a:?} overlaps {b:?}");
            }
        }
        for y in 5..15 {
            for x in 3..26 {
                assert!(parcel_at(&parcels, x, y).is_some());
            }
        }
        assert!(parcel_at(&parcels, 26, 5).is_none());
    }

    #[test]
    fn row_major_order_and_edge_clipping() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let parcels = generator()
            .generate(ParcelRegion::new(0, 0, 5, 3), 2, &mut rng)
            .expect("parcels");
        let layout: Vec<_> = parcels
            .iter()
            .map(|parcel| (parcel.x, parcel.y, parcel.width, parcel.height))
            .collect();
        assert_eq!(
            layout,
            vec![
                (0, 0, 2, 2),
                (2, 0, 2, 2),
                (4, 0, 1, 2),
                (0, 2, 2, 1),
                (2, 2, 2, 1),
                (4, 2, 1, 1),
            ]
        );
    }

    #[test]
    fn same_seed_same_parcels() {
        let generator = generator();
        let a = generator
            .generate_full_map(40, 40, 8, &mut ChaCha8Rng::seed_from_u64(99))
            .expect("parcels");
        let b = generator
            .generate_full_map(40, 40, 8, &mut ChaCha8Rng::seed_from_u64(99))
            .expect("parcels");
        assert_eq!(a, b);
    }

    #[test]
    fn zero_weight_categories_never_appear() {
        let weights = CategoryWeights {
            residential: 0.0,
            commercial: 1.0,
            industrial: 0.0,
            mixed_use: 0.0,
        };
        let generator = ParcelGridGenerator::new(weights, false).expect("generator");
        let parcels = generator
            .generate_full_map(30, 30, 3, &mut ChaCha8Rng::seed_from_u64(3))
            .expect("parcels");
        assert!(parcels
            .iter()
            .all(|parcel| parcel.category == ParcelCategory::Commercial
                && parcel.building_type.is_none()));
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let bad_sum = CategoryWeights {
            residential: 0.5,
            ..CategoryWeights::default()
        };
        assert!(matches!(
            ParcelGridGenerator::new(bad_sum, true),
            Err(ParcelError::WeightSum(_))
        ));
        let negative = CategoryWeights {
            residential: 0.6,
            commercial: -0.2,
            industrial: 0.5,
            mixed_use: 0.1,
        };
        assert!(matches!(
            ParcelGridGenerator::new(negative, true),
            Err(ParcelError::InvalidWeight {
                category: ParcelCategory::Commercial,
                ..
            })
        ));
        assert_eq!(
            generator().generate(ParcelRegion::new(0, 0, 4, 4), 0, &mut ChaCha8Rng::seed_from_u64(0)),
            Err(ParcelError::ZeroCellSize)
        );
    }

    #[test]
    fn region_past_coordinate_range_is_rejected() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let result = generator().generate(ParcelRegion::new(u32::MAX - 2, 0, 8, 4), 4, &mut rng);
        assert_eq!(
            result,
            Err(ParcelError::RegionOverflow {
                x: u32::MAX - 2,
                y: 0,
                width: 8,
                height: 4,
            })
        );
        assert!(generator()
            .generate(ParcelRegion::new(0, u32::MAX - 4, 4, 4), 4, &mut rng)
            .is_ok());
    }

    #[test]
    fn empty_region_yields_no_parcels() {
        let parcels = generator()
            .generate(ParcelRegion::new(0, 0, 0, 10), 4, &mut ChaCha8Rng::seed_from_u64(0))
            .expect("parcels");
        assert!(parcels.is_empty());
    }

    #[test]
    fn export_shape_uses_type_and_building_type_keys() {
        let parcel = Parcel {
            number: 4,
            x: 0,
            y: 8,
            width: 8,
            height: 8,
            category: ParcelCategory::MixedUse,
            building_type: Some(BuildingType::Office),
        };
        let value = serde_json::to_value(&parcel).expect("json");
        assert_eq!(value["type"], "mixed-use");
        assert_eq!(value["buildingType"], "office");
        assert_eq!(value["number"], 4);
    }
}
