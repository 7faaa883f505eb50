//! crates/diet_planner_core/src/estimator.rs
//!
//! The deterministic plan estimator: a calorie target from a fixed BMR
//! formula and activity multiplier, bodyweight-based macros, and a fixed
//! five-slot meal template.
//!
//! Two known quirks are kept as-is:
//! - the BMR formula has no sex term (it always uses the female constant);
//! - macro grams come from bodyweight only and are not reconciled with the
//!   calorie target through the 4/4/9 kcal-per-gram identity.

use crate::domain::{Meal, MealPlan, UserProfile};

pub const CALORIE_FLOOR: f64 = 1200.0;

const PROTEIN_G_PER_KG: f64 = 1.6;
const CARBS_G_PER_KG: f64 = 2.5;
const FAT_G_PER_KG: f64 = 0.8;

/// Foods for a slot, with the preparation steps shown in the quick-start preview.
struct FoodChoice {
    foods: &'static [&'static str],
    prep_steps: &'static [&'static str],
}

struct Slot {
    name: &'static str,
    time: &'static str,
    share_percent: u32,
    default: FoodChoice,
}

const MORNING_SNACK: usize = 1;
const LUNCH: usize = 2;
const DINNER: usize = 4;

const TEMPLATE: [Slot; 5] = [
    Slot {
        name: "Café da Manhã",
        time: "07:00",
        share_percent: 25,
        default: FoodChoice {
            foods: &[
                "1 fatia de pão integral",
                "1 ovo mexido",
                "1/2 abacate",
                "1 xícara de chá verde",
            ],
            prep_steps: &[
                "Toste o pão integral",
                "Mexa o ovo em fogo baixo com uma pitada de sal",
                "Amasse o abacate sobre o pão",
                "Prepare o chá verde sem açúcar",
            ],
        },
    },
    Slot {
        name: "Lanche da Manhã",
        time: "10:00",
        share_percent: 10,
        default: FoodChoice {
            foods: &[
                "1 iogurte grego natural",
                "1 colher de mel",
                "Castanhas (30g)",
            ],
            prep_steps: &[
                "Sirva o iogurte em uma tigela",
                "Regue com o mel e finalize com as castanhas",
            ],
        },
    },
    Slot {
        name: "Almoço",
        time: "12:30",
        share_percent: 35,
        default: FoodChoice {
            foods: &[
                "150g peito de frango grelhado",
                "1 xícara de arroz integral",
                "Salada verde",
                "1 colher de azeite",
            ],
            prep_steps: &[
                "Tempere o frango e grelhe por 6 minutos de cada lado",
                "Cozinhe o arroz integral",
                "Monte a salada e tempere com o azeite",
            ],
        },
    },
    Slot {
        name: "Lanche da Tarde",
        time: "15:30",
        share_percent: 10,
        default: FoodChoice {
            foods: &[
                "1 banana",
                "2 colheres de pasta de amendoim",
                "1 copo de água de coco",
            ],
            prep_steps: &[
                "Fatie a banana",
                "Sirva com a pasta de amendoim e a água de coco gelada",
            ],
        },
    },
    Slot {
        name: "Jantar",
        time: "19:00",
        share_percent: 20,
        default: FoodChoice {
            foods: &[
                "150g salmão grelhado",
                "Batata doce assada",
                "Brócolis refogado",
                "Salada de rúcula",
            ],
            prep_steps: &[
                "Asse a batata doce em cubos por 25 minutos",
                "Grelhe o salmão com limão e ervas",
                "Refogue o brócolis no alho",
                "Sirva com a rúcula",
            ],
        },
    },
];

const DAIRY_FREE_SNACK: FoodChoice = FoodChoice {
    foods: &[
        "1 iogurte de coco sem lactose",
        "1 colher de mel",
        "Castanhas (30g)",
    ],
    prep_steps: &[
        "Sirva o iogurte de coco em uma tigela",
        "Regue com o mel e finalize com as castanhas",
    ],
};

const VEGETARIAN_LUNCH: FoodChoice = FoodChoice {
    foods: &[
        "150g tofu grelhado",
        "1 xícara de arroz integral",
        "1/2 xícara de feijão",
        "Salada verde",
        "1 colher de azeite",
    ],
    prep_steps: &[
        "Seque o tofu, corte em fatias e grelhe até dourar",
        "Cozinhe o arroz integral e aqueça o feijão",
        "Monte a salada e tempere com o azeite",
    ],
};

const VEGETARIAN_DINNER: FoodChoice = FoodChoice {
    foods: &[
        "1 xícara de grão-de-bico assado",
        "Batata doce assada",
        "Brócolis refogado",
        "Salada de rúcula",
    ],
    prep_steps: &[
        "Asse o grão-de-bico e a batata doce por 25 minutos",
        "Refogue o brócolis no alho",
        "Sirva com a rúcula",
    ],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Macros {
    pub protein: u32,
    pub carbs: u32,
    pub fat: u32,
}

/// BMR in kcal/day.
pub fn basal_metabolic_rate(profile: &UserProfile) -> f64 {
    10.0 * profile.weight + 6.25 * profile.height - 5.0 * profile.age - 161.0
}

/// Daily calorie target after activity, goal and the 1200 kcal floor.
pub fn daily_calories(profile: &UserProfile) -> u32 {
    let calories = basal_metabolic_rate(profile) * profile.activity_level.multiplier()
        + profile.goal.calorie_adjustment();
    calories.max(CALORIE_FLOOR).round() as u32
}

pub fn macros(weight_kg: f64) -> Macros {
    Macros {
        protein: grams(weight_kg * PROTEIN_G_PER_KG),
        carbs: grams(weight_kg * CARBS_G_PER_KG),
        fat: grams(weight_kg * FAT_G_PER_KG),
    }
}

fn grams(value: f64) -> u32 {
    value.max(0.0).round() as u32
}

/// Builds the meal plan for a profile. Never fails.
pub fn estimate(profile: &UserProfile) -> MealPlan {
    build(profile, false)
}

/// The quick-start preview: the same plan with preparation steps per meal.
pub fn quick_start(profile: &UserProfile) -> MealPlan {
    build(profile, true)
}

fn build(profile: &UserProfile, with_prep_steps: bool) -> MealPlan {
    let total_calories = daily_calories(profile);
    let Macros {
        protein,
        carbs,
        fat,
    } = macros(profile.weight);

    MealPlan {
        total_calories,
        protein,
        carbs,
        fat,
        meals: assemble_meals(total_calories, profile, with_prep_steps),
    }
}

fn assemble_meals(total_calories: u32, profile: &UserProfile, with_prep_steps: bool) -> Vec<Meal> {
    let restrictions = profile.restrictions.to_lowercase();
    let lactose_free = restrictions.contains("lactose");
    let vegetarian =
        restrictions.contains("vegetarian") || restrictions.contains("vegetariana");

    // Truncation keeps each slot's original share; nothing is re-normalized.
    TEMPLATE
        .iter()
        .enumerate()
        .take(usize::from(profile.meals_per_day))
        .map(|(index, slot)| {
            let choice = match index {
                MORNING_SNACK if lactose_free => &DAIRY_FREE_SNACK,
                LUNCH if vegetarian => &VEGETARIAN_LUNCH,
                DINNER if vegetarian => &VEGETARIAN_DINNER,
                _ => &slot.default,
            };

            Meal {
                name: slot.name.to_string(),
                time: slot.time.to_string(),
                calories: slot_calories(total_calories, slot.share_percent),
                foods: to_strings(choice.foods),
                prep_steps: with_prep_steps.then(|| to_strings(choice.prep_steps)),
            }
        })
        .collect()
}

fn slot_calories(total_calories: u32, share_percent: u32) -> u32 {
    (f64::from(total_calories) * f64::from(share_percent) / 100.0).round() as u32
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Names of the template slots, in order.
pub fn slot_names() -> impl Iterator<Item = &'static str> {
    TEMPLATE.iter().map(|slot| slot.name)
}
