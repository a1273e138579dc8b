use clap::Parser;

/// Labels a JPEG image using a pre-trained Inception model.
#[derive(Parser, Clone)]
#[command(
    author,
    version,
    about = "Labels a JPEG image using a pre-trained Inception model",
    long_about = "Labels a JPEG image using a pre-trained Inception model \
                  (http://arxiv.org/abs/1512.00567).\n\nThe model directory must contain the \
                  unzipped contents of the inception archive from\n\
                  https://storage.googleapis.com/download.tensorflow.org/models/inception5h.zip"
)]
pub struct Args {
    /// Directory containing the unzipped contents of the pre-trained model
    pub model_dir: String,

    /// Path to a JPEG image file
    pub image: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_operands_parse() {
        let args = Args::try_parse_from(["label-image", "models", "dog.jpg"]).unwrap();
        assert_eq!(args.model_dir, "models");
        assert_eq!(args.image, "dog.jpg");
    }

    #[test]
    fn missing_operands_are_rejected() {
        assert!(Args::try_parse_from(["label-image"]).is_err());
        assert!(Args::try_parse_from(["label-image", "models"]).is_err());
    }

    #[test]
    fn extra_operands_are_rejected() {
        assert!(Args::try_parse_from(["label-image", "models", "dog.jpg", "cat.jpg"]).is_err());
    }
}
