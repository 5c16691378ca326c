mod infobox;

pub use infobox::{insert_infoboxes, InfoboxResult};

/// A keyword category and the prompt it produces.
#[derive(Debug, Clone, Copy)]
pub struct Category {
    pub name: &'static str,
    pub keywords: &'static [&'static str],
    pub template: &'static str,
}

impl Category {
    fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|keyword| lowered.contains(keyword))
    }
}

/// Categories in priority order; the first match wins.
pub const CATEGORIES: &[Category] = &[
    Category {
        name: "happy",
        keywords: &["happy", "cheerful", "joy", "celebrate", "delighted"],
        template: "A bright, cheerful scene with vibrant colors representing happiness, joyful expressions, and positive emotions",
    },
    Category {
        name: "sad",
        keywords: &["sad", "melancholy", "depressed", "gloomy", "heartbroken"],
        template: "A muted, melancholic scene with soft lighting representing sadness, thoughtful expressions, and gentle emotions",
    },
    Category {
        name: "excited",
        keywords: &["exciting", "energetic", "excited", "thrilling", "dynamic"],
        template: "An energetic, dynamic scene with vivid colors representing excitement, motion, and high energy",
    },
    Category {
        name: "tired",
        keywords: &["tired", "sleepy", "exhausted", "rest", "relax"],
        template: "A cozy, sleepy scene with warm lighting representing rest, relaxation, and peaceful emotions",
    },
    Category {
        name: "surprise",
        keywords: &["surprise", "amazed", "wow", "astonished", "shocked"],
        template: "A scene showing surprise or amazement with dramatic lighting and expressive elements",
    },
    Category {
        name: "love",
        keywords: &["love", "affection", "romance", "caring", "affectionate"],
        template: "A warm, loving scene with soft lighting and affectionate elements",
    },
    Category {
        name: "anger",
        keywords: &["anger", "mad", "furious", "rage", "irate"],
        template: "A scene representing strong emotions with bold colors and intense expressions",
    },
    Category {
        name: "nature",
        keywords: &["nature", "forest", "mountains", "lake", "river", "garden", "park"],
        template: "Beautiful nature scene with forests, mountains, lakes, and natural elements",
    },
    Category {
        name: "city",
        keywords: &["city", "urban", "building", "street", "metropolis", "skyscraper"],
        template: "Modern cityscape with buildings, urban environment, and metropolitan elements",
    },
    Category {
        name: "technology",
        keywords: &["technology", "computer", "digital", "robot", "ai", "future"],
        template: "Futuristic technology scene with computers, digital interfaces, and high-tech elements",
    },
    Category {
        name: "food",
        keywords: &["food", "meal", "restaurant", "cooking", "delicious"],
        template: "Delicious food scene with appetizing presentation and warm lighting",
    },
    Category {
        name: "music",
        keywords: &["music", "concert", "song", "instrument", "singing"],
        template: "Musical scene with instruments, concert atmosphere, and rhythmic elements",
    },
    Category {
        name: "sports",
        keywords: &["sports", "game", "exercise", "competition", "athletic"],
        template: "Sports scene with athletic activity, competition, and dynamic movement",
    },
];

/// Returns the first category whose keywords occur in `sentence`.
pub fn match_category(sentence: &str) -> Option<&'static Category> {
    let lowered = sentence.to_lowercase();
    CATEGORIES.iter().find(|category| category.matches(&lowered))
}

/// Maps a sentence to an image-generation prompt.
pub fn generate_prompt(sentence: &str, context: &str) -> String {
    match match_category(sentence) {
        Some(category) => category.template.to_string(),
        None => format!(
            "Scene representing: {}. Context: {}. Highly detailed, realistic, vibrant colors, professional photography",
            sentence, context
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_listed_category_wins() {
        let prompt = generate_prompt("A happy walk through the forest.", "");
        assert_eq!(prompt, CATEGORIES[0].template);
        assert_eq!(match_category("the forest was happy").map(|c| c.name), Some("happy"));
    }

    #[test]
    fn happy_is_listed_before_nature() {
        let position = |name: &str| CATEGORIES.iter().position(|c| c.name == name).unwrap();
        assert!(position("happy") < position("nature"));
    }

    #[test]
    fn matching_is_case_insensitive_substring() {
        assert_eq!(match_category("The CITY never sleeps").map(|c| c.name), Some("city"));
        // "said" contains "ai"
        assert_eq!(match_category("She said nothing").map(|c| c.name), Some("technology"));
    }

    #[test]
    fn falls_back_to_generic_prompt() {
        let prompt = generate_prompt("A quiet moment.", "Chapter one");
        assert_eq!(
            prompt,
            "Scene representing: A quiet moment.. Context: Chapter one. Highly detailed, realistic, vibrant colors, professional photography"
        );
    }

    #[test]
    fn is_deterministic() {
        let a = generate_prompt("We built a robot.", "lab");
        let b = generate_prompt("We built a robot.", "lab");
        assert_eq!(a, b);
    }
}
